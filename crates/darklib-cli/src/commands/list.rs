use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use console::Style;

use darklib_core::master::list_masters;

#[derive(Args)]
pub struct ListArgs {
    /// Master dark library directory
    #[arg(long, value_name = "DIR", default_value = "darklib")]
    pub library: PathBuf,
}

pub fn run(args: &ListArgs) -> Result<()> {
    let masters = list_masters(&args.library)?;
    if masters.is_empty() {
        println!("No masters found in {}", args.library.display());
        return Ok(());
    }

    let header_style = Style::new().cyan().bold();
    let dim = Style::new().dim();

    println!();
    println!(
        "{}",
        header_style.apply_to(format!(
            "{} master(s) in {}",
            masters.len(),
            args.library.display()
        ))
    );
    println!(
        "{:<22} {:>9} {:>8} {:>6} {:>8} {:<20} {:>7}  {}",
        "Camera", "Temp C", "Exp s", "Gain", "Binning", "Created", "Frames", "Stack command"
    );

    for master in &masters {
        let created = master
            .created_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "N/A".to_string());
        println!(
            "{:<22} {:>9} {:>8} {:>6} {:>8} {:<20} {:>7}  {}",
            master.camera.as_deref().unwrap_or("N/A"),
            master
                .temperature_c
                .map(|t| format!("{t:.1}"))
                .unwrap_or_else(|| "N/A".to_string()),
            master
                .exposure_s
                .map(|e| format!("{e:.1}"))
                .unwrap_or_else(|| "N/A".to_string()),
            master
                .gain
                .map(|g| g.to_string())
                .unwrap_or_else(|| "N/A".to_string()),
            master.binning.as_deref().unwrap_or("N/A"),
            created,
            master
                .n_frames_used
                .map(|n| n.to_string())
                .unwrap_or_else(|| "N/A".to_string()),
            master.stack_signature.as_deref().unwrap_or("N/A"),
        );
        let file = master
            .path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!("{}", dim.apply_to(format!("    -> {file}")));
    }
    println!();

    Ok(())
}
