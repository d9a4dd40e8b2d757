//! MftScope CLI
//!
//! Forensic inspection of raw NTFS volume images: volume geometry, single
//! MFT record dumps, alternate data stream listings and whole-MFT walks.

use clap::{Parser, Subcommand};
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use mftscope::ntfs::values::{AttributeValue, FileNameValues, StandardInformationValues};
use mftscope::ntfs::{attribute_type_name, filetime_to_datetime};
use mftscope::{MftEntry, NtfsVolume, Result};
use serde::Serialize;
use std::path::PathBuf;

/// MftScope - read-only NTFS volume and MFT inspector
#[derive(Parser)]
#[command(name = "mftscope")]
#[command(author = "MftScope Contributors")]
#[command(version)]
#[command(about = "Read-only NTFS volume and MFT inspector", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show volume geometry from the boot sector
    Info {
        /// Path to the raw volume image
        image: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        output: String,
    },

    /// Dump one MFT entry and its attributes
    Entry {
        /// Path to the raw volume image
        image: PathBuf,

        /// MFT entry index
        index: u64,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        output: String,
    },

    /// List the alternate data streams of one MFT entry
    Streams {
        /// Path to the raw volume image
        image: PathBuf,

        /// MFT entry index
        index: u64,
    },

    /// Walk every MFT entry and summarise the volume
    Walk {
        /// Path to the raw volume image
        image: PathBuf,

        /// Stop after this many entries
        #[arg(long)]
        limit: Option<u64>,
    },
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Commands::Info { image, output } => show_info(&image, &output),
        Commands::Entry {
            image,
            index,
            output,
        } => show_entry(&image, index, &output),
        Commands::Streams { image, index } => show_streams(&image, index),
        Commands::Walk { image, limit } => walk(&image, limit),
    };

    if let Err(error) = outcome {
        eprintln!("{} {}", style("error:").red().bold(), error);
        std::process::exit(1);
    }
}

// ============================================================================
// info
// ============================================================================

#[derive(Serialize)]
struct VolumeSummary {
    bytes_per_sector: u16,
    cluster_block_size: u32,
    mft_entry_size: u32,
    index_entry_size: u32,
    volume_size: u64,
    volume_serial_number: String,
    mft_offset: u64,
    mirror_mft_offset: u64,
    number_of_entries: u64,
    volume_name: Option<String>,
    ntfs_version: Option<String>,
}

fn show_info(image: &PathBuf, output: &str) -> Result<()> {
    let volume = NtfsVolume::open(image)?;
    let header = volume.header();

    let summary = VolumeSummary {
        bytes_per_sector: header.bytes_per_sector,
        cluster_block_size: header.cluster_block_size,
        mft_entry_size: header.mft_entry_size,
        index_entry_size: header.index_entry_size,
        volume_size: header.volume_size,
        volume_serial_number: format!("{:016X}", header.volume_serial_number),
        mft_offset: header.mft_offset,
        mirror_mft_offset: header.mirror_mft_offset,
        number_of_entries: volume.number_of_entries(),
        volume_name: volume.volume_name().unwrap_or(None),
        ntfs_version: volume
            .volume_information()
            .unwrap_or(None)
            .map(|information| {
                format!(
                    "{}.{}",
                    information.major_version, information.minor_version
                )
            }),
    };

    if output == "json" {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("{}", style("NTFS volume").bold());
    if let Some(name) = &summary.volume_name {
        println!("  label:            {}", name);
    }
    if let Some(version) = &summary.ntfs_version {
        println!("  NTFS version:     {}", version);
    }
    println!("  serial number:    {}", summary.volume_serial_number);
    println!(
        "  volume size:      {} ({})",
        summary.volume_size,
        format_size(summary.volume_size, BINARY)
    );
    println!("  bytes per sector: {}", summary.bytes_per_sector);
    println!("  cluster size:     {}", summary.cluster_block_size);
    println!("  MFT entry size:   {}", summary.mft_entry_size);
    println!("  index entry size: {}", summary.index_entry_size);
    println!("  MFT offset:       {:#x}", summary.mft_offset);
    println!("  MFT mirror:       {:#x}", summary.mirror_mft_offset);
    println!("  MFT entries:      {}", summary.number_of_entries);
    Ok(())
}

// ============================================================================
// entry
// ============================================================================

#[derive(Serialize)]
struct AttributeSummary {
    type_name: &'static str,
    type_value: u32,
    name: Option<String>,
    resident: bool,
    data_size: u64,
    chained_pieces: usize,
}

#[derive(Serialize)]
struct EntrySummary {
    index: u64,
    file_reference: String,
    allocated: bool,
    empty: bool,
    bad: bool,
    corrupted: bool,
    directory: bool,
    base_record: Option<String>,
    journal_sequence_number: u64,
    file_names: Vec<String>,
    timestamps: Option<Timestamps>,
    attributes: Vec<AttributeSummary>,
}

#[derive(Serialize)]
struct Timestamps {
    created: String,
    modified: String,
    entry_modified: String,
    accessed: String,
}

fn summarise_entry(entry: &MftEntry) -> EntrySummary {
    let attributes = entry
        .attributes()
        .iter()
        .map(|attribute| AttributeSummary {
            type_name: attribute_type_name(attribute.attribute_type),
            type_value: attribute.attribute_type,
            name: attribute.name(),
            resident: attribute.is_resident(),
            data_size: attribute.data_size(),
            chained_pieces: attribute.chain().len(),
        })
        .collect();

    let timestamps = entry
        .standard_information_attribute()
        .and_then(|attribute| StandardInformationValues::read_from_mft_attribute(attribute).ok())
        .map(|values| Timestamps {
            created: filetime_to_datetime(values.creation_time).to_rfc3339(),
            modified: filetime_to_datetime(values.modification_time).to_rfc3339(),
            entry_modified: filetime_to_datetime(values.entry_modification_time).to_rfc3339(),
            accessed: filetime_to_datetime(values.access_time).to_rfc3339(),
        });

    let file_names = entry
        .attributes()
        .iter()
        .filter(|attribute| {
            attribute.attribute_type == mftscope::AttributeType::FileName as u32
        })
        .filter_map(|attribute| FileNameValues::read_from_mft_attribute(attribute).ok())
        .map(|values| values.name())
        .collect();

    let base_record = {
        let reference = entry.base_record_file_reference();
        (!reference.is_zero()).then(|| reference.to_string())
    };

    EntrySummary {
        index: entry.index(),
        file_reference: entry.file_reference().to_string(),
        allocated: entry.is_allocated(),
        empty: entry.is_empty(),
        bad: entry.is_bad(),
        corrupted: entry.is_corrupted(),
        directory: entry.has_directory_entries_index(),
        base_record,
        journal_sequence_number: entry.journal_sequence_number(),
        file_names,
        timestamps,
        attributes,
    }
}

fn show_entry(image: &PathBuf, index: u64, output: &str) -> Result<()> {
    let volume = NtfsVolume::open(image)?;
    let entry = volume.entry(index)?;
    let summary = summarise_entry(&entry);

    if output == "json" {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!(
        "{} {}",
        style(format!("MFT entry {}", summary.index)).bold(),
        if summary.empty {
            style(if summary.bad { "(bad)" } else { "(empty)" }).red()
        } else if summary.corrupted {
            style("(corrupted)").yellow()
        } else {
            style("")
        }
    );
    if summary.empty {
        return Ok(());
    }

    println!("  file reference:  {}", summary.file_reference);
    println!("  allocated:       {}", summary.allocated);
    println!("  directory:       {}", summary.directory);
    if let Some(base_record) = &summary.base_record {
        println!("  base record:     {}", base_record);
    }
    println!("  journal number:  {:#x}", summary.journal_sequence_number);
    for name in &summary.file_names {
        println!("  name:            {}", name);
    }
    if let Some(timestamps) = &summary.timestamps {
        println!("  created:         {}", timestamps.created);
        println!("  modified:        {}", timestamps.modified);
        println!("  accessed:        {}", timestamps.accessed);
    }

    println!("  attributes:");
    for attribute in &summary.attributes {
        let name = attribute
            .name
            .as_ref()
            .map(|name| format!(" \"{}\"", name))
            .unwrap_or_default();
        let chained = if attribute.chained_pieces > 0 {
            format!(" (+{} pieces)", attribute.chained_pieces)
        } else {
            String::new()
        };
        println!(
            "    {:24}{} {} {}{}",
            attribute.type_name,
            name,
            if attribute.resident {
                "resident"
            } else {
                "non-resident"
            },
            format_size(attribute.data_size, BINARY),
            chained,
        );
    }

    // Decode the reparse point when the entry carries one
    if let Some(attribute) = entry.reparse_point_attribute() {
        if let Ok(AttributeValue::ReparsePoint(values)) = volume.read_attribute_value(attribute) {
            println!("  reparse tag:     {:#010x}", values.tag);
            if let Some(name) = values.substitute_name() {
                println!("  substitute name: {}", name);
            }
            if let Some(name) = values.print_name() {
                println!("  print name:      {}", name);
            }
            if let Some(wof) = &values.wof {
                println!(
                    "  WOF compression: {}",
                    wof.compression_method_name()
                );
            }
        }
    }
    Ok(())
}

// ============================================================================
// streams
// ============================================================================

fn show_streams(image: &PathBuf, index: u64) -> Result<()> {
    let volume = NtfsVolume::open(image)?;
    let entry = volume.entry(index)?;

    if let Some(data_attribute) = entry.data_attribute() {
        println!(
            "{:24} {} {}",
            style("<default>").dim().to_string(),
            if data_attribute.is_resident() {
                "resident"
            } else {
                "non-resident"
            },
            format_size(data_attribute.data_size(), BINARY),
        );
    }

    for stream_index in 0..entry.number_of_alternate_data_attributes() {
        let attribute = entry
            .alternate_data_attribute_by_index(stream_index)
            .expect("index within bounds");
        println!(
            "{:24} {} {}",
            attribute.name().unwrap_or_default(),
            if attribute.is_resident() {
                "resident"
            } else {
                "non-resident"
            },
            format_size(attribute.data_size(), BINARY),
        );
    }
    Ok(())
}

// ============================================================================
// walk
// ============================================================================

fn walk(image: &PathBuf, limit: Option<u64>) -> Result<()> {
    let volume = NtfsVolume::open(image)?;
    let total = limit
        .unwrap_or(u64::MAX)
        .min(volume.number_of_entries());

    let progress = ProgressBar::new(total);
    progress.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} entries {msg}")
            .expect("static template"),
    );

    let mut allocated = 0u64;
    let mut directories = 0u64;
    let mut empty = 0u64;
    let mut bad = 0u64;
    let mut corrupted = 0u64;
    let mut unreadable = 0u64;
    let mut stream_bytes = 0u64;

    for index in 0..total {
        match volume.entry(index) {
            Ok(entry) => {
                if entry.is_empty() {
                    empty += 1;
                    if entry.is_bad() {
                        bad += 1;
                    }
                } else {
                    if entry.is_allocated() {
                        allocated += 1;
                    }
                    if entry.has_directory_entries_index() {
                        directories += 1;
                    }
                    if entry.is_corrupted() {
                        corrupted += 1;
                    }
                    if let Some(data_attribute) = entry.data_attribute() {
                        stream_bytes += data_attribute.data_size();
                    }
                }
            }
            Err(error) if error.is_recoverable() => {
                log::warn!("entry {}: {}", index, error);
                unreadable += 1;
            }
            Err(error) => return Err(error),
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    println!("{}", style("MFT walk").bold());
    println!("  entries walked:  {}", total);
    println!("  allocated:       {}", allocated);
    println!("  directories:     {}", directories);
    println!("  empty slots:     {}", empty);
    println!("  bad records:     {}", bad);
    println!("  corrupted:       {}", corrupted);
    println!("  unreadable:      {}", unreadable);
    println!(
        "  data bytes:      {} ({})",
        stream_bytes,
        format_size(stream_bytes, BINARY)
    );
    Ok(())
}
