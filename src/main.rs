use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use log::info;

use sphere_shader_types::{verify, DeviceModule, LayoutReport, StructLayout};

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse(env::args().skip(1))?;
    let module = match &options.shader {
        Some(path) => DeviceModule::from_path(path)
            .with_context(|| format!("failed to load device module {}", path.display()))?,
        None => DeviceModule::builtin().context("built-in device module is invalid")?,
    };
    info!("checking host layouts against {}", options.source_name());

    let report = verify(&module);
    if options.json {
        let json = serde_json::to_string_pretty(&report).context("failed to encode report")?;
        println!("{json}");
    } else {
        print_report(&report);
    }

    report
        .into_result()
        .with_context(|| format!("{} does not match the host layout", options.source_name()))?;
    Ok(())
}

fn print_report(report: &LayoutReport) {
    for entry in &report.structs {
        let binding = entry
            .binding
            .map(|binding| format!(" {binding}"))
            .unwrap_or_default();
        println!("{} ({:?}){binding}", entry.name, entry.kind);
        if let Some(host) = &entry.host {
            print_layout("host", host);
        }
        if let Some(device) = &entry.device {
            print_layout("device", device);
        }
        if entry.mismatches.is_empty() {
            println!("  OK");
        } else {
            for mismatch in &entry.mismatches {
                println!("  MISMATCH {mismatch}");
            }
        }
    }
}

fn print_layout(side: &str, layout: &StructLayout) {
    println!("  {side}: {} bytes", layout.size);
    for field in &layout.fields {
        let location = field
            .location()
            .map(|location| format!(" @location({location})"))
            .unwrap_or_default();
        let ty = field.ty.map(|ty| format!(": {ty}")).unwrap_or_default();
        println!(
            "    {:>4} {:>4} {}{ty}{location}",
            field.offset, field.size, field.name
        );
    }
}

#[derive(Debug)]
struct CliOptions {
    shader: Option<PathBuf>,
    json: bool,
}

impl CliOptions {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut shader = None;
        let mut json = false;
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--json" => json = true,
                "--shader" => {
                    let path = args
                        .next()
                        .ok_or_else(|| anyhow!("--shader expects a path to a WGSL file"))?;
                    shader = Some(PathBuf::from(path));
                }
                other => {
                    return Err(anyhow!(
                        "Unknown argument: {other}. Usage: sphere-layout [--json] [--shader <file.wgsl>]"
                    ));
                }
            }
        }
        Ok(Self { shader, json })
    }

    fn source_name(&self) -> String {
        match &self.shader {
            Some(path) => path.display().to_string(),
            None => "built-in device module".to_string(),
        }
    }
}
