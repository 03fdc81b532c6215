//! Output rendering and formatting

use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use console::Style;
use serde::Serialize;
use std::io;
use yama_install::{InstallResult, InstallStatus, InstalledPackage};

/// Result of a CLI command, before rendering
#[derive(Debug, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum CommandOutput {
    Installs(Vec<InstallResult>),
    Packages(Vec<InstalledPackage>),
    Package(InstalledPackage),
    Removed(InstalledPackage),
}

impl CommandOutput {
    /// Exit code of the first unsuccessful install, 0 otherwise
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Installs(results) => results
                .iter()
                .map(InstallResult::exit_code)
                .find(|code| *code != 0)
                .unwrap_or(0),
            Self::Packages(_) | Self::Package(_) | Self::Removed(_) => 0,
        }
    }
}

/// Output renderer for CLI results
#[derive(Clone)]
pub struct OutputRenderer {
    json_output: bool,
    colors: bool,
}

impl OutputRenderer {
    pub fn new(json_output: bool, colors: bool) -> Self {
        Self {
            json_output,
            colors,
        }
    }

    pub fn render(&self, output: &CommandOutput) -> io::Result<()> {
        if self.json_output {
            let json = serde_json::to_string_pretty(output).map_err(io::Error::other)?;
            println!("{json}");
            return Ok(());
        }

        match output {
            CommandOutput::Installs(results) => self.render_installs(results),
            CommandOutput::Packages(packages) => self.render_package_list(packages),
            CommandOutput::Package(package) => self.render_package_info(package),
            CommandOutput::Removed(package) => {
                println!("Removed {} from {}", package.name, package.destination.display());
            }
        }
        Ok(())
    }

    fn table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        if !self.colors {
            table.force_no_tty();
        }
        table
    }

    fn render_installs(&self, results: &[InstallResult]) {
        let mut table = self.table();
        table.set_header(vec![
            Cell::new("Package").add_attribute(Attribute::Bold),
            Cell::new("Status").add_attribute(Attribute::Bold),
            Cell::new("Destination").add_attribute(Attribute::Bold),
            Cell::new("Files").add_attribute(Attribute::Bold),
            Cell::new("Time").add_attribute(Attribute::Bold),
        ]);

        for result in results {
            table.add_row(vec![
                Cell::new(&result.name),
                status_cell(&result.status),
                Cell::new(result.destination_path.display()),
                Cell::new(result.files),
                Cell::new(format_duration_ms(result.duration_ms)),
            ]);
        }
        println!("{table}");

        let err = Style::new().red().force_styling(self.colors);
        for result in results {
            if let InstallStatus::Failed(reason) = &result.status {
                println!("{} {}: {}", err.apply_to("error:"), result.name, reason.message);
            }
        }
    }

    fn render_package_list(&self, packages: &[InstalledPackage]) {
        if packages.is_empty() {
            println!("No packages installed.");
            return;
        }

        let mut table = self.table();
        table.set_header(vec![
            Cell::new("Package").add_attribute(Attribute::Bold),
            Cell::new("Destination").add_attribute(Attribute::Bold),
            Cell::new("Files").add_attribute(Attribute::Bold),
            Cell::new("Installed").add_attribute(Attribute::Bold),
        ]);
        for package in packages {
            table.add_row(vec![
                Cell::new(&package.name),
                Cell::new(package.destination.display()),
                Cell::new(package.files),
                Cell::new(package.installed_at.format("%Y-%m-%d %H:%M:%S")),
            ]);
        }
        println!("{table}");
    }

    fn render_package_info(&self, package: &InstalledPackage) {
        let name = Style::new().bold().cyan().force_styling(self.colors);
        println!("{}", name.apply_to(&package.name));
        println!();
        println!("Destination: {}", package.destination.display());
        println!("Source:      {}", package.url);
        println!("Digest:      {}", package.digest);
        println!("Files:       {}", package.files);
        println!(
            "Installed:   {}",
            package.installed_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
}

fn status_cell(status: &InstallStatus) -> Cell {
    match status {
        InstallStatus::Success => Cell::new("installed").fg(Color::Green),
        InstallStatus::Failed(reason) => Cell::new(format!("failed ({})", reason.kind)).fg(Color::Red),
        InstallStatus::Cancelled => Cell::new("cancelled").fg(Color::Yellow),
    }
}

fn format_duration_ms(ms: u64) -> String {
    if ms < 1_000 {
        format!("{ms}ms")
    } else {
        #[allow(clippy::cast_precision_loss)]
        let secs = ms as f64 / 1_000.0;
        format!("{secs:.1}s")
    }
}
