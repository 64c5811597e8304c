use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::features::{DatasetReport, FeatureConfig, FeatureRow};

pub fn feature_header(cfg: &FeatureConfig) -> Vec<String> {
    let mut header = vec!["fixture_id".to_string()];
    for column in cfg.diff_columns() {
        header.push(format!("ht_diff_{}", column.name()));
    }
    for name in [
        "favorite_location",
        "odds_home",
        "odds_draw",
        "odds_away",
        "implied_prob_home",
        "implied_prob_draw",
        "implied_prob_away",
        "prob_margin",
        "odds_ratio_hw",
        "odds_fav",
        "odds_und",
    ] {
        header.push(name.to_string());
    }
    if cfg.pressure_feature {
        header.push("avg_pressure_index_1st_half".to_string());
    }
    header.push(cfg.target_column());
    header
}

fn opt_to_string<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl FeatureRow {
    /// Cells in [`feature_header`] order. Missing differentials are empty
    /// cells; the pressure cell is present only when the row carries one.
    pub fn to_record(&self) -> Vec<String> {
        let mut out = vec![self.fixture_id.to_string()];
        out.extend(self.ht_diffs.iter().map(|(_, v)| opt_to_string(*v)));
        out.push(self.favorite.as_str().to_string());
        out.push(self.odds_home.to_string());
        out.push(self.odds_draw.to_string());
        out.push(self.odds_away.to_string());
        out.push(self.implied_prob_home.to_string());
        out.push(self.implied_prob_draw.to_string());
        out.push(self.implied_prob_away.to_string());
        out.push(self.prob_margin.to_string());
        out.push(self.odds_ratio_hw.to_string());
        out.push(self.odds_fav.to_string());
        out.push(self.odds_und.to_string());
        if let Some(pressure) = self.avg_pressure_index_1st_half {
            out.push(pressure.to_string());
        }
        out.push(self.target.to_string());
        out
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create output directory {}", parent.display()))?;
    }
    Ok(())
}

pub fn write_csv(path: &Path, cfg: &FeatureConfig, rows: &[FeatureRow]) -> Result<()> {
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("open csv output {}", path.display()))?;
    writer
        .write_record(feature_header(cfg))
        .context("write csv header")?;
    for row in rows {
        writer
            .write_record(row.to_record())
            .with_context(|| format!("write csv row for fixture {}", row.fixture_id))?;
    }
    writer.flush().context("flush csv output")?;
    Ok(())
}

pub fn write_xlsx(
    path: &Path,
    cfg: &FeatureConfig,
    rows: &[FeatureRow],
    report: &DatasetReport,
) -> Result<()> {
    ensure_parent(path)?;
    let mut data_rows = vec![feature_header(cfg)];
    data_rows.extend(rows.iter().map(FeatureRow::to_record));

    let mut summary_rows = vec![
        vec!["metric".to_string(), "value".to_string()],
        vec!["candidates".to_string(), report.candidates.to_string()],
        vec![
            "excluded_incomplete".to_string(),
            report.excluded_incomplete.to_string(),
        ],
        vec!["rows".to_string(), report.rows.to_string()],
    ];
    for (reason, count) in &report.exclusions {
        summary_rows.push(vec![format!("excluded_{reason}"), count.to_string()]);
    }

    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Dataset")?;
        write_rows(sheet, &data_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Summary")?;
        write_rows(sheet, &summary_rows)?;
    }
    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;
    Ok(())
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            worksheet
                .write_string(row_idx as u32, col_idx as u16, value)
                .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}
