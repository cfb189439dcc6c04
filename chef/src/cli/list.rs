use chef_common::error::Result;
use chef_core::Chef;
use clap::Args;
use colored::Colorize;
use prettytable::{format, Cell, Row, Table};
use tokio_util::sync::CancellationToken;

use crate::status::kind_label;

#[derive(Args, Debug, Default, Clone)]
pub struct List {
    /// Only show installed recipes
    #[arg(long)]
    pub installed: bool,
}

impl List {
    pub async fn run(&self, chef: &Chef, cancel: &CancellationToken) -> Result<()> {
        let rows = chef.list(cancel).await?;
        let total = rows.len();
        let installed_count = rows.iter().filter(|r| r.installed.is_some()).count();
        let rows: Vec<_> = rows
            .into_iter()
            .filter(|r| !self.installed || r.installed.is_some())
            .collect();
        if rows.is_empty() {
            if total == 0 {
                println!("{}", "No recipes defined".yellow());
            } else {
                println!("{}", "0 recipes installed".yellow());
            }
            return Ok(());
        }

        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
        table.add_row(Row::new(vec![
            Cell::new("Name").style_spec("b"),
            Cell::new("Installed").style_spec("b"),
            Cell::new("Kind").style_spec("b"),
            Cell::new("Provider").style_spec("b"),
            Cell::new("Description").style_spec("b"),
        ]));
        for row in &rows {
            let name = if row.running {
                format!("{} ●", row.name)
            } else {
                row.name.clone()
            };
            table.add_row(Row::new(vec![
                Cell::new(&name).style_spec("Fb"),
                Cell::new(row.installed.as_deref().unwrap_or("-")),
                Cell::new(&row.kind.as_ref().map(kind_label).unwrap_or_default()),
                Cell::new(row.provider.as_deref().unwrap_or("")).style_spec("Fy"),
                Cell::new(row.description.as_deref().unwrap_or("")),
            ]));
        }
        table.printstd();
        println!(
            "{}",
            format!("{installed_count} of {total} recipes installed").bold()
        );
        Ok(())
    }
}
