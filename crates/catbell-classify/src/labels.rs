use std::path::Path;

use crate::error::ClassifyError;

/// Loads the YAMNet class-map CSV (`index,mid,display_name`) into a vector
/// of display names indexed by class id.
pub fn load_class_map(path: &Path) -> Result<Vec<String>, ClassifyError> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| ClassifyError::LabelMap(format!("{}: {}", path.display(), e)))?;

    let mut labels = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ClassifyError::LabelMap(e.to_string()))?;
        let index: usize = record
            .get(0)
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| ClassifyError::LabelMap("missing or non-numeric index".to_string()))?;
        let name = record
            .get(2)
            .ok_or_else(|| ClassifyError::LabelMap("missing display_name column".to_string()))?;

        if index != labels.len() {
            return Err(ClassifyError::LabelMap(format!(
                "non-contiguous class index {} at row {}",
                index,
                labels.len()
            )));
        }
        labels.push(name.to_string());
    }

    if labels.is_empty() {
        return Err(ClassifyError::LabelMap(format!(
            "{}: no classes found",
            path.display()
        )));
    }

    tracing::debug!("Loaded {} classes from {}", labels.len(), path.display());
    Ok(labels)
}
