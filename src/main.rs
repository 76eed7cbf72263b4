use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use dicom_seg_volume::{
    DecodeOptions, MultiClassReader, MultiClassVolume, Orientation, SegError, SegmentReader,
    SegmentVolumes, SegmentationHeader, Volume, Voxel,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Axis {
    Axial,
    Coronal,
    Sagittal,
}

impl From<Axis> for Orientation {
    fn from(axis: Axis) -> Self {
        match axis {
            Axis::Axial => Orientation::Axial,
            Axis::Coronal => Orientation::Coronal,
            Axis::Sagittal => Orientation::Sagittal,
        }
    }
}

/// Decode a DICOM-SEG file and export the centre slice of each volume
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// DICOM Segmentation file
    file: PathBuf,

    /// Decode all segments into a single labelmap
    #[arg(long)]
    multi_class: bool,

    #[arg(long, value_enum, default_value = "axial")]
    orientation: Axis,

    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Keep FRACTIONAL values in their stored range
    #[arg(long)]
    no_rescale: bool,

    /// Decode segments one after another
    #[arg(long)]
    sequential: bool,
}

fn main() -> Result<(), SegError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let orientation = Orientation::from(args.orientation);
    std::fs::create_dir_all(&args.output_dir)?;

    if args.multi_class {
        let reader = MultiClassReader::load_from_file(&args.file)?;
        print_header(&reader.header);
        let path = args.output_dir.join("labelmap.png");
        match &reader.volume {
            MultiClassVolume::U8(volume) => save_center_slice(volume, orientation, &path)?,
            MultiClassVolume::U16(volume) => save_center_slice(volume, orientation, &path)?,
        }
    } else {
        let options = DecodeOptions::new()
            .with_parallel(!args.sequential)
            .with_rescale_fractional(!args.no_rescale);
        let reader = SegmentReader::load_from_file(&args.file, &options)?;
        print_header(&reader.header);
        match &reader.volumes {
            SegmentVolumes::Binary(volumes) => {
                for (number, volume) in volumes {
                    let path = args.output_dir.join(format!("segment-{number}.png"));
                    save_center_slice(volume, orientation, &path)?;
                }
            }
            SegmentVolumes::Fractional(volumes) => {
                for (number, volume) in volumes {
                    let path = args.output_dir.join(format!("segment-{number}.png"));
                    save_center_slice(volume, orientation, &path)?;
                }
            }
        }
    }

    Ok(())
}

fn print_header(header: &SegmentationHeader) {
    for info in header.segment_infos.values() {
        println!(
            "{:>4}  {:<24} {:<14} {} ({})",
            info.number,
            info.label,
            info.algorithm_type.to_string(),
            info.property_type.meaning,
            info.property_category.meaning,
        );
    }
    let geometry = &header.geometry;
    println!("origin    {:?}", geometry.origin());
    println!("spacing   {:?}", geometry.spacing());
    println!("size      {:?}", geometry.size());
    if let Some(uid) = header.referenced_series_uid() {
        println!("series    {uid}");
    }
}

fn save_center_slice<T: Voxel>(
    volume: &Volume<T>,
    orientation: Orientation,
    path: &Path,
) -> Result<(), SegError> {
    let (slices, rows, columns) = volume.dim();
    let index = match orientation {
        Orientation::Axial => slices / 2,
        Orientation::Coronal => rows / 2,
        Orientation::Sagittal => columns / 2,
    };
    if let Some(image) = volume.get_image_from_axis(index, orientation) {
        image.save(path)?;
        info!(path = %path.display(), "wrote slice");
    }
    Ok(())
}
