//! Raw pixel-grid access for single-frame, single-sample DICOM instances.
//!
//! The grid is decoded straight from the PixelData payload as described by
//! Rows, Columns, BitsAllocated and PixelRepresentation, held as `f64` for
//! filtering, and re-encoded with the identical shape and sample type.
//! Compressed transfer syntaxes and multi-sample layouts are rejected.

use crate::filter;

use dicom::core::{PrimitiveValue, VR};
use dicom::object::InMemDicomObject;
use dicom_dictionary_std::tags;
use ndarray::Array2;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PixelError {
    #[error("missing required attribute {0}")]
    MissingAttribute(&'static str),

    #[error("cannot read attribute {name}: {message}")]
    InvalidAttribute { name: &'static str, message: String },

    #[error("unsupported pixel layout: {0}")]
    UnsupportedLayout(String),

    #[error("pixel payload holds {actual} bytes, expected {expected}")]
    PayloadLength { expected: usize, actual: usize },
}

/// Storage interpretation of one pixel sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    U8,
    I8,
    U16,
    I16,
}

impl SampleType {
    fn from_layout(bits_allocated: u16, pixel_representation: u16) -> Result<Self, PixelError> {
        match (bits_allocated, pixel_representation) {
            (8, 0) => Ok(SampleType::U8),
            (8, 1) => Ok(SampleType::I8),
            (16, 0) => Ok(SampleType::U16),
            (16, 1) => Ok(SampleType::I16),
            _ => Err(PixelError::UnsupportedLayout(format!(
                "BitsAllocated={bits_allocated}, PixelRepresentation={pixel_representation}"
            ))),
        }
    }

    fn bytes_per_sample(self) -> usize {
        match self {
            SampleType::U8 | SampleType::I8 => 1,
            SampleType::U16 | SampleType::I16 => 2,
        }
    }

    fn clamp(self, value: f64) -> f64 {
        match self {
            SampleType::U8 => value.clamp(0.0, u8::MAX as f64),
            SampleType::I8 => value.clamp(i8::MIN as f64, i8::MAX as f64),
            SampleType::U16 => value.clamp(0.0, u16::MAX as f64),
            SampleType::I16 => value.clamp(i16::MIN as f64, i16::MAX as f64),
        }
    }
}

/// One slice's sample grid together with its storage interpretation.
#[derive(Debug)]
pub struct PixelGrid {
    pub samples: Array2<f64>,
    pub sample_type: SampleType,
}

impl PixelGrid {
    /// Decodes the native PixelData payload of a dataset.
    pub fn from_dataset(dataset: &InMemDicomObject) -> Result<Self, PixelError> {
        let rows = read_u16(dataset, tags::ROWS, "Rows")? as usize;
        let columns = read_u16(dataset, tags::COLUMNS, "Columns")? as usize;
        let samples_per_pixel = read_u16(dataset, tags::SAMPLES_PER_PIXEL, "SamplesPerPixel")?;
        if samples_per_pixel != 1 {
            return Err(PixelError::UnsupportedLayout(format!(
                "SamplesPerPixel={samples_per_pixel}"
            )));
        }
        let bits_allocated = read_u16(dataset, tags::BITS_ALLOCATED, "BitsAllocated")?;
        let pixel_representation =
            read_u16(dataset, tags::PIXEL_REPRESENTATION, "PixelRepresentation")?;
        let sample_type = SampleType::from_layout(bits_allocated, pixel_representation)?;

        let bytes = dataset
            .element(tags::PIXEL_DATA)
            .map_err(|_| PixelError::MissingAttribute("PixelData"))?
            .to_bytes()
            .map_err(|err| PixelError::InvalidAttribute {
                name: "PixelData",
                message: err.to_string(),
            })?;
        let expected = rows * columns * sample_type.bytes_per_sample();
        if bytes.len() != expected {
            return Err(PixelError::PayloadLength {
                expected,
                actual: bytes.len(),
            });
        }

        let values: Vec<f64> = match sample_type {
            SampleType::U8 => bytes.iter().map(|&b| b as f64).collect(),
            SampleType::I8 => bytes.iter().map(|&b| b as i8 as f64).collect(),
            SampleType::U16 => bytes
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]) as f64)
                .collect(),
            SampleType::I16 => bytes
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]) as i16 as f64)
                .collect(),
        };
        let samples = Array2::from_shape_vec((rows, columns), values)
            .map_err(|err| PixelError::UnsupportedLayout(err.to_string()))?;

        Ok(PixelGrid {
            samples,
            sample_type,
        })
    }

    /// Returns a smoothed copy of this grid; shape and sample type carry over.
    pub fn smoothed(&self, sigma: f64) -> PixelGrid {
        PixelGrid {
            samples: filter::gaussian_smooth(self.samples.view(), sigma),
            sample_type: self.sample_type,
        }
    }

    /// Re-encodes the grid as a PixelData value, rounding each sample to the
    /// nearest representable value of the stored type.
    pub fn to_pixel_payload(&self) -> (VR, PrimitiveValue) {
        let rounded = self
            .samples
            .iter()
            .map(|&v| self.sample_type.clamp(v.round()));
        match self.sample_type {
            SampleType::U8 => {
                let bytes: Vec<u8> = rounded.map(|v| v as u8).collect();
                (VR::OB, PrimitiveValue::U8(bytes.into()))
            }
            SampleType::I8 => {
                let bytes: Vec<u8> = rounded.map(|v| v as i8 as u8).collect();
                (VR::OB, PrimitiveValue::U8(bytes.into()))
            }
            SampleType::U16 => {
                let words: Vec<u16> = rounded.map(|v| v as u16).collect();
                (VR::OW, PrimitiveValue::U16(words.into()))
            }
            SampleType::I16 => {
                let words: Vec<u16> = rounded.map(|v| v as i16 as u16).collect();
                (VR::OW, PrimitiveValue::U16(words.into()))
            }
        }
    }

    pub fn dim(&self) -> (usize, usize) {
        self.samples.dim()
    }
}

fn read_u16(
    dataset: &InMemDicomObject,
    tag: dicom::core::Tag,
    name: &'static str,
) -> Result<u16, PixelError> {
    dataset
        .element(tag)
        .map_err(|_| PixelError::MissingAttribute(name))?
        .to_int::<u16>()
        .map_err(|err| PixelError::InvalidAttribute {
            name,
            message: err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom::core::DataElement;
    use dicom_dictionary_std::tags;

    fn pixel_dataset(
        rows: u16,
        columns: u16,
        bits_allocated: u16,
        pixel_representation: u16,
        payload: PrimitiveValue,
    ) -> InMemDicomObject {
        InMemDicomObject::from_element_iter([
            DataElement::new(tags::ROWS, VR::US, PrimitiveValue::from(rows)),
            DataElement::new(tags::COLUMNS, VR::US, PrimitiveValue::from(columns)),
            DataElement::new(tags::SAMPLES_PER_PIXEL, VR::US, PrimitiveValue::from(1_u16)),
            DataElement::new(
                tags::BITS_ALLOCATED,
                VR::US,
                PrimitiveValue::from(bits_allocated),
            ),
            DataElement::new(
                tags::PIXEL_REPRESENTATION,
                VR::US,
                PrimitiveValue::from(pixel_representation),
            ),
            DataElement::new(
                tags::PIXEL_DATA,
                if bits_allocated == 8 { VR::OB } else { VR::OW },
                payload,
            ),
        ])
    }

    #[test]
    fn u16_roundtrip_preserves_samples() {
        let words: Vec<u16> = vec![0, 100, 200, 300, 400, 65535];
        let dataset = pixel_dataset(2, 3, 16, 0, PrimitiveValue::U16(words.clone().into()));
        let grid = PixelGrid::from_dataset(&dataset).unwrap();
        assert_eq!(grid.dim(), (2, 3));
        assert_eq!(grid.sample_type, SampleType::U16);

        let (vr, payload) = grid.to_pixel_payload();
        assert_eq!(vr, VR::OW);
        assert_eq!(payload, PrimitiveValue::U16(words.into()));
    }

    #[test]
    fn i16_negative_samples_survive_roundtrip() {
        let raw: Vec<u16> = vec![(-5_i16) as u16, 7, (-32768_i16) as u16, 32767];
        let dataset = pixel_dataset(2, 2, 16, 1, PrimitiveValue::U16(raw.clone().into()));
        let grid = PixelGrid::from_dataset(&dataset).unwrap();
        assert_eq!(grid.sample_type, SampleType::I16);
        assert_eq!(grid.samples[(0, 0)], -5.0);
        assert_eq!(grid.samples[(1, 0)], -32768.0);

        let (_, payload) = grid.to_pixel_payload();
        assert_eq!(payload, PrimitiveValue::U16(raw.into()));
    }

    #[test]
    fn u8_grid_decodes() {
        let bytes: Vec<u8> = vec![1, 2, 3, 4];
        let dataset = pixel_dataset(2, 2, 8, 0, PrimitiveValue::U8(bytes.into()));
        let grid = PixelGrid::from_dataset(&dataset).unwrap();
        assert_eq!(grid.sample_type, SampleType::U8);
        assert_eq!(grid.samples[(1, 1)], 4.0);
    }

    #[test]
    fn payload_length_mismatch_is_rejected() {
        let words: Vec<u16> = vec![1, 2, 3];
        let dataset = pixel_dataset(2, 2, 16, 0, PrimitiveValue::U16(words.into()));
        let err = PixelGrid::from_dataset(&dataset).unwrap_err();
        assert!(matches!(err, PixelError::PayloadLength { expected: 8, actual: 6 }));
    }

    #[test]
    fn multi_sample_layouts_are_rejected() {
        let mut dataset = pixel_dataset(1, 1, 8, 0, PrimitiveValue::U8(vec![0].into()));
        dataset.put(DataElement::new(
            tags::SAMPLES_PER_PIXEL,
            VR::US,
            PrimitiveValue::from(3_u16),
        ));
        assert!(matches!(
            PixelGrid::from_dataset(&dataset),
            Err(PixelError::UnsupportedLayout(_))
        ));
    }

    #[test]
    fn smoothing_keeps_type_and_shape() {
        let words: Vec<u16> = (0..64).collect();
        let dataset = pixel_dataset(8, 8, 16, 0, PrimitiveValue::U16(words.into()));
        let grid = PixelGrid::from_dataset(&dataset).unwrap();
        let smoothed = grid.smoothed(2.0);
        assert_eq!(smoothed.dim(), (8, 8));
        assert_eq!(smoothed.sample_type, SampleType::U16);
    }
}
