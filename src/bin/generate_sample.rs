use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rusty_wiz::data::export::write_parquet;
use rusty_wiz::{CombineOp, Dataset, Operation, SliceMode, Template, ORIGINAL};

/// Gaussian sample via Box-Muller.
fn gauss(rng: &mut impl Rng, std_dev: f64) -> f64 {
    let u1: f64 = rng.random::<f64>().max(1e-15);
    let u2: f64 = rng.random();
    std_dev * (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Noisy quadratic drift with a slow oscillation on top.
fn signal(t: f64) -> f64 {
    0.002 * t * t - 0.3 * t + 5.0 + 2.0 * (t / 15.0).sin()
}

fn main() -> Result<()> {
    env_logger::init();
    let mut rng = SmallRng::seed_from_u64(42);

    // Time axis: 0 → 499.5, step 0.5
    let x: Vec<f64> = (0..1000).map(|i| i as f64 * 0.5).collect();
    let y: Vec<f64> = x.iter().map(|&t| signal(t) + gauss(&mut rng, 0.4)).collect();

    // Text source with a header, a comment column and a few broken samples
    let mut text = String::from("time,value,channel\n");
    for (i, (&t, &v)) in x.iter().zip(&y).enumerate() {
        let value = match i {
            100 => "nan".to_string(),
            400 => "inf".to_string(),
            _ => format!("{v:.6}"),
        };
        writeln!(text, "{t},{value},ch{}", i % 3).context("formatting row")?;
    }
    let text_path = Path::new("sample_data.txt");
    std::fs::write(text_path, text).context("writing text sample")?;

    // Same series as a binary x/y pair
    let dataset = Dataset::new("Raw Data", x, y).context("building dataset")?;
    let parquet_path = Path::new("sample_data.parquet");
    write_parquet(&dataset, parquet_path)?;

    // A template exercising every kind of step
    let template = Template::new("detrend")
        .with_step(
            Operation::Slice {
                source: ORIGINAL.into(),
                begin: 50.0.into(),
                end: 400.0.into(),
                mode: SliceMode::ByValue,
            },
            "window",
        )
        .with_step(
            Operation::Fit {
                source: "window".into(),
                degree: 2,
            },
            "trend",
        )
        .with_step(
            Operation::Combine {
                left: "window".into(),
                right: "trend".into(),
                op: CombineOp::Subtract,
            },
            "residual",
        )
        .with_step(
            Operation::Call {
                function: "dataset.mean".into(),
                args: vec!["residual".into()],
            },
            "residual_mean",
        )
        .with_step(
            Operation::Call {
                function: "math.abs".into(),
                args: vec!["residual".into()],
            },
            "residual_abs",
        );
    let template_path = Path::new("sample_template.wizt");
    template.save(template_path)?;

    println!(
        "Wrote {} samples to {} and {}, template '{}' ({} steps) to {}",
        dataset.len(),
        text_path.display(),
        parquet_path.display(),
        template.name(),
        template.step_count(),
        template_path.display()
    );
    Ok(())
}
