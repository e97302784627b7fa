use anyhow::Result;
use clap::ValueEnum;
use colored::*;
use nvsmi_query::{Gpu, GpuProcess};
use std::fmt::Display;
use std::io::Write;
use tabled::{settings::Style, Table, Tabled};

/// How records are written to stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Human readable table
    Table,
}

#[derive(Tabled)]
struct GpuRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "UUID")]
    uuid: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "GPU Util")]
    gpu_util: String,
    #[tabled(rename = "Mem Util")]
    mem_util: String,
    #[tabled(rename = "Mem Free")]
    mem_free: String,
    #[tabled(rename = "Mem Total")]
    mem_total: String,
    #[tabled(rename = "Temp")]
    temperature: String,
    #[tabled(rename = "Driver")]
    driver: String,
}

#[derive(Tabled)]
struct ProcessRow {
    #[tabled(rename = "PID")]
    pid: u32,
    #[tabled(rename = "Process")]
    process_name: String,
    #[tabled(rename = "GPU")]
    gpu_id: String,
    #[tabled(rename = "GPU UUID")]
    gpu_uuid: String,
    #[tabled(rename = "GPU Name")]
    gpu_name: String,
    #[tabled(rename = "Memory")]
    used_memory: String,
}

impl From<&Gpu> for GpuRow {
    fn from(gpu: &Gpu) -> Self {
        Self {
            id: gpu.id().to_string(),
            uuid: gpu.uuid().to_string(),
            name: gpu.name().to_string(),
            gpu_util: format_percent(gpu.gpu_util()),
            mem_util: format_percent(gpu.mem_util()),
            mem_free: format_mb(gpu.mem_free()),
            mem_total: format_mb(gpu.mem_total()),
            temperature: format_temperature(gpu.temperature()),
            driver: gpu.driver().to_string(),
        }
    }
}

impl From<&GpuProcess> for ProcessRow {
    fn from(proc: &GpuProcess) -> Self {
        Self {
            pid: proc.pid,
            process_name: proc.process_name.clone(),
            gpu_id: if proc.has_known_gpu() {
                proc.gpu_id.to_string()
            } else {
                "?".to_string()
            },
            gpu_uuid: proc.gpu_uuid.clone(),
            gpu_name: proc.gpu_name.clone(),
            used_memory: format_mb(proc.used_memory),
        }
    }
}

fn format_percent(value: f64) -> String {
    if value.is_nan() {
        "N/A".to_string()
    } else {
        format!("{:.1}%", value)
    }
}

fn format_mb(value: f64) -> String {
    if value.is_nan() {
        "N/A".to_string()
    } else {
        format!("{:.0} MB", value)
    }
}

fn format_temperature(temp: f64) -> String {
    if temp.is_nan() {
        return "N/A".to_string();
    }
    let text = format!("{:.0}°C", temp);
    let colored = if temp > 85.0 {
        text.red()
    } else if temp > 75.0 {
        text.yellow()
    } else {
        text.green()
    };
    colored.to_string()
}

fn write_lines<T: Display>(out: &mut impl Write, records: &[T]) -> Result<()> {
    for record in records {
        writeln!(out, "{}", record)?;
    }
    Ok(())
}

pub fn write_gpus(out: &mut impl Write, gpus: &[Gpu], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => write_lines(out, gpus),
        OutputFormat::Table => {
            if !gpus.is_empty() {
                let rows: Vec<GpuRow> = gpus.iter().map(GpuRow::from).collect();
                writeln!(out, "{}", Table::new(rows).with(Style::rounded()))?;
            }
            Ok(())
        }
    }
}

pub fn write_processes(out: &mut impl Write, processes: &[GpuProcess], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => write_lines(out, processes),
        OutputFormat::Table => {
            if !processes.is_empty() {
                let rows: Vec<ProcessRow> = processes.iter().map(ProcessRow::from).collect();
                writeln!(out, "{}", Table::new(rows).with(Style::rounded()))?;
            }
            Ok(())
        }
    }
}
