use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::error::{Result, ServeError};

/// Outcome of one inference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// Human readable class of the image
    pub class_name: String,

    /// Model output for that class
    pub probability: f32,
}

/// Maps a model output index back to its class name.
///
/// Loaded from a text file holding one class name per line, line `i` naming
/// output `i`.
#[derive(Debug, Clone)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn new(classes: Vec<String>) -> Result<Self> {
        if classes.is_empty() {
            return Err(ServeError::Artifact("label file has no classes".to_owned()));
        }
        Ok(LabelEncoder { classes })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Blank lines inside the file are kept so indices stay aligned; trailing
    /// ones are dropped.
    pub fn parse(contents: &str) -> Result<Self> {
        let mut classes: Vec<String> = contents
            .lines()
            .map(|line| line.trim_end_matches('\r').to_owned())
            .collect();

        while classes.last().map_or(false, |c| c.trim().is_empty()) {
            classes.pop();
        }

        Self::new(classes)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Decode a probability vector for a single image.
    ///
    /// With two classes and a single output the model is a binary classifier
    /// and the output is thresholded at 0.5. Otherwise the arg-max wins, the
    /// lowest index on ties.
    pub fn decode(&self, output: &[f32]) -> Result<Prediction> {
        if output.len() == 1 && self.classes.len() == 2 {
            let p = output[0];
            if p.is_nan() {
                return Err(ServeError::Label("model output is NaN".to_owned()));
            }
            let index = if p > 0.5 { 1 } else { 0 };
            return Ok(Prediction {
                class_name: self.classes[index].clone(),
                probability: p,
            });
        }

        let (index, probability) = argmax(output)
            .ok_or_else(|| ServeError::Label("model output has no usable value".to_owned()))?;

        let class_name = self.classes.get(index).ok_or_else(|| {
            ServeError::Label(format!(
                "output index {} out of range for {} classes",
                index,
                self.classes.len()
            ))
        })?;

        Ok(Prediction {
            class_name: class_name.clone(),
            probability,
        })
    }
}

fn argmax(values: &[f32]) -> Option<(usize, f32)> {
    values
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .fold(None, |best, (i, v)| match best {
            Some((_, b)) if v <= b => best,
            _ => Some((i, v)),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoder() -> LabelEncoder {
        LabelEncoder::parse("Apple___Apple_scab\nApple___healthy\nTomato___Late_blight\n").unwrap()
    }

    #[test]
    fn parse_drops_trailing_blank_lines() {
        let enc = LabelEncoder::parse("a\r\nb\r\n\n\n").unwrap();
        assert_eq!(enc.len(), 2);
    }

    #[test]
    fn parse_keeps_inner_blank_lines() {
        let enc = LabelEncoder::parse("a\n\nc").unwrap();
        assert_eq!(enc.len(), 3);
        assert_eq!(enc.decode(&[0.0, 0.0, 1.0]).unwrap().class_name, "c");
    }

    #[test]
    fn empty_file_is_rejected() {
        assert!(LabelEncoder::parse("").is_err());
        assert!(LabelEncoder::parse("\n\n").is_err());
    }

    #[test]
    fn decodes_argmax() {
        let pred = encoder().decode(&[0.1, 0.7, 0.2]).unwrap();
        assert_eq!(pred.class_name, "Apple___healthy");
        assert_eq!(pred.probability, 0.7);
    }

    #[test]
    fn ties_pick_lowest_index() {
        let pred = encoder().decode(&[0.4, 0.4, 0.2]).unwrap();
        assert_eq!(pred.class_name, "Apple___Apple_scab");
    }

    #[test]
    fn nan_entries_are_ignored() {
        let pred = encoder().decode(&[f32::NAN, 0.3, 0.6]).unwrap();
        assert_eq!(pred.class_name, "Tomato___Late_blight");
        assert!(encoder().decode(&[f32::NAN, f32::NAN, f32::NAN]).is_err());
    }

    #[test]
    fn empty_output_is_an_error() {
        assert!(encoder().decode(&[]).is_err());
    }

    #[test]
    fn index_without_label_is_an_error() {
        assert!(encoder().decode(&[0.0, 0.1, 0.2, 0.9]).is_err());
    }

    #[test]
    fn binary_output_is_thresholded() {
        let enc = LabelEncoder::parse("healthy\ndiseased").unwrap();

        let pred = enc.decode(&[0.8]).unwrap();
        assert_eq!(pred.class_name, "diseased");
        assert_eq!(pred.probability, 0.8);

        let pred = enc.decode(&[0.5]).unwrap();
        assert_eq!(pred.class_name, "healthy");
        assert_eq!(pred.probability, 0.5);

        assert!(enc.decode(&[f32::NAN]).is_err());
    }
}
