use console::Style;
use darklib_core::report::{GroupOutcome, RunReport};

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    good: Style,
    bad: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            good: Style::new().green(),
            bad: Style::new().red(),
            path: Style::new().underlined(),
        }
    }
}

pub fn print_report(report: &RunReport) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Dark Library Update"));
    println!(
        "  {}",
        s.title
            .apply_to("\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}")
    );
    println!();

    // Updated masters
    let builds = report.builds();
    if builds == 0 {
        println!(
            "  {:<18}{}",
            s.header.apply_to("Updated masters"),
            s.label.apply_to("none")
        );
    } else {
        println!(
            "  {} ({})",
            s.header.apply_to("Updated masters"),
            builds
        );
        for built in report.built() {
            let marker = if built.dry_run { "~" } else { "+" };
            println!(
                "    {} {}",
                s.good.apply_to(marker),
                s.value.apply_to(&built.group)
            );
            println!(
                "      {:<10}{}",
                s.label.apply_to("file"),
                s.path.apply_to(built.master_path.display())
            );
            println!(
                "      {:<10}{}/{} frames used{}{}",
                s.label.apply_to("frames"),
                built.n_frames_used,
                built.n_frames_total,
                if built.forced { ", forced rebuild" } else { "" },
                if built.dry_run { ", dry run" } else { "" },
            );
        }
    }
    println!();

    // Skips and failures
    for outcome in &report.outcomes {
        match outcome {
            GroupOutcome::Skipped { group, reason } => {
                println!(
                    "  {} {} ({})",
                    s.label.apply_to("skipped"),
                    group,
                    reason
                );
            }
            GroupOutcome::Failed { group, error } => {
                println!(
                    "  {} {} ({})",
                    s.bad.apply_to("FAILED"),
                    s.value.apply_to(group),
                    error
                );
            }
            GroupOutcome::Built(_) => {}
        }
    }
    if !report.outcomes.is_empty() {
        println!();
    }

    // Rejections
    if !report.rejections.is_empty() {
        println!(
            "  {} ({})",
            s.header.apply_to("Rejected frames"),
            report.frames_rejected()
        );
        for group in &report.rejections {
            println!("    {}", s.value.apply_to(&group.group));
            for frame in &group.frames {
                println!(
                    "      {} {} ({})",
                    s.bad.apply_to("x"),
                    frame.path.display(),
                    frame.reason
                );
                if let Some(stats) = &frame.stats {
                    println!(
                        "        {}",
                        s.label.apply_to(format!(
                            "median {:.1} ADU, mad/median {:.3}, hot {:.3}%, spread {:.2}",
                            stats.median,
                            stats.mad_ratio,
                            stats.hot_pixel_fraction * 100.0,
                            stats.central_dispersion
                        ))
                    );
                }
            }
        }
        println!();
    }

    // Totals
    println!("  {}", s.header.apply_to("Totals"));
    println!(
        "    {:<18}{}",
        s.label.apply_to("frames seen"),
        s.value.apply_to(report.frames_seen)
    );
    println!(
        "    {:<18}{}",
        s.label.apply_to("frames used"),
        s.value.apply_to(report.frames_used())
    );
    println!(
        "    {:<18}{}",
        s.label.apply_to("frames rejected"),
        s.value.apply_to(report.frames_rejected())
    );
    println!(
        "    {:<18}{}",
        s.label.apply_to("age filtered"),
        s.value.apply_to(report.frames_age_filtered)
    );
    println!(
        "    {:<18}{}",
        s.label.apply_to("engine runs"),
        s.value.apply_to(report.engine_invocations)
    );
    if let Some(rate) = report.success_rate() {
        println!(
            "    {:<18}{}",
            s.label.apply_to("success rate"),
            s.value.apply_to(format!("{:.1}%", rate * 100.0))
        );
    }
    if report.cancelled {
        println!(
            "    {:<18}{}",
            s.label.apply_to("status"),
            s.bad.apply_to("cancelled")
        );
    }
    println!();
}
