use std::path::{Path, PathBuf};

use crate::api::AnalysisService;
use crate::error::Result;
use crate::models::{ConfusionMatrixImage, TransactionFile};
use crate::settings::{get_output_dir, shellexpand_path};
use crate::shell::CONFUSION_FILE_NAME;

pub fn run(file: &str, output: Option<String>) -> Result<()> {
    let client = super::client()?;
    let target = match output {
        Some(o) => PathBuf::from(shellexpand_path(&o)),
        None => get_output_dir().join(CONFUSION_FILE_NAME),
    };
    let (path, image) = save_with(&client, Path::new(&shellexpand_path(file)), &target)?;
    println!(
        "Saved confusion matrix ({}x{}) to {}",
        image.width,
        image.height,
        path.display()
    );
    Ok(())
}

pub fn save_with(
    service: &dyn AnalysisService,
    input: &Path,
    target: &Path,
) -> Result<(PathBuf, ConfusionMatrixImage)> {
    let file = TransactionFile::read(input)?;
    let image = service
        .fetch_confusion_matrix(&file)
        .and_then(ConfusionMatrixImage::from_png)?;
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| CONFUSION_FILE_NAME.to_string());
    let path = image.save(dir, &name)?;
    Ok((path, image))
}
