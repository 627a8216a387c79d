use std::path::Path;

use tracing::info;

use crate::error::LebeError;

/// Displacement/force samples of one compression test
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProcessedData {
    pub displacement: Vec<f64>,
    pub force: Vec<f64>,
}

impl ProcessedData {
    pub fn len(&self) -> usize {
        self.displacement.len()
    }

    pub fn is_empty(&self) -> bool {
        self.displacement.is_empty()
    }

    pub fn samples(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.displacement.iter().copied().zip(self.force.iter().copied())
    }
}

/// Header name without unit suffix, e.g. `Force [kN]` -> `force`
fn column_name(header: &str) -> String {
    let name = match header.find('[') {
        Some(idx) => &header[..idx],
        None => header,
    };
    name.trim().to_lowercase()
}

/// Parses processed CSV data with `displacement` and `force` columns
///
/// # Arguments
/// * `contents` - The text of the csv file
///
/// # Returns
/// The samples in file order
pub fn parse_processed_data(contents: &str) -> Result<ProcessedData, LebeError> {
    let mut headers: Vec<String> = Vec::new();
    let mut displacement_index: usize = 0;
    let mut force_index: usize = 0;
    let mut data = ProcessedData::default();

    for (line_number, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        if headers.is_empty() {
            headers = line.split(',').map(column_name).collect();

            let position = |name: &str| headers.iter().position(|h| h == name);
            match (position("displacement"), position("force")) {
                (Some(d), Some(f)) => {
                    displacement_index = d;
                    force_index = f;
                }
                _ => {
                    return Err(LebeError::Input(
                        "Error in processed data: Missing displacement and/or force column"
                            .to_owned(),
                    ))
                }
            }
            continue;
        }

        let line_contents: Vec<&str> = line.split(',').map(|x| x.trim()).collect();
        let value = |index: usize| -> Result<f64, LebeError> {
            line_contents
                .get(index)
                .and_then(|v| v.parse().ok())
                .ok_or_else(|| {
                    LebeError::Input(format!(
                        "Non-float value in processed data at line {}",
                        line_number + 1
                    ))
                })
        };

        data.displacement.push(value(displacement_index)?);
        data.force.push(value(force_index)?);
    }

    if headers.is_empty() {
        return Err(LebeError::Input("Processed data file is empty".to_owned()));
    }

    Ok(data)
}

pub fn read_processed_data(path: &Path) -> Result<ProcessedData, LebeError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(err) => {
            return Err(LebeError::Input(format!(
                "Unable to open processed data file {}: {err}",
                path.display()
            )))
        }
    };

    let data = parse_processed_data(&contents)?;
    info!("loaded {} samples from {}", data.len(), path.display());
    Ok(data)
}
