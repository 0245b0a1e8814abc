//! Per-slice transform: re-tag one incoming slice under a new series and
//! replace its pixel payload with the Gaussian-smoothed grid.

use std::path::{Path, PathBuf};

use crate::pixels::{PixelError, PixelGrid};
use crate::series::SERIES_SEPARATOR;
use crate::settings::Settings;
use crate::uid::UidSource;

use dicom::core::{DataElement, PrimitiveValue, Tag, VR};
use dicom::object::{FileMetaTableBuilder, InMemDicomObject, ReadError, WriteError, open_file};
use dicom_dictionary_std::tags;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("filename {0} does not follow the <seriesUID>#<sopUID>.dcm convention")]
    BadFileName(String),

    #[error("DICOM read error: {0}")]
    Read(#[from] ReadError),

    #[error("DICOM write error: {0}")]
    Write(#[from] WriteError),

    #[error("missing required attribute {0}")]
    MissingAttribute(&'static str),

    #[error("cannot read attribute {name}: {message}")]
    InvalidAttribute { name: &'static str, message: String },

    #[error(transparent)]
    Pixels(#[from] PixelError),

    #[error("cannot build file meta: {0}")]
    Meta(String),
}

/// Transforms one slice and writes it into the output directory.
///
/// The output filename keeps the SOP portion of the input name and swaps
/// in the new series UID. Returns the path of the written file.
pub fn process_slice(
    input_dir: &Path,
    file_name: &str,
    output_dir: &Path,
    series_uid: &str,
    settings: &Settings,
    uids: &dyn UidSource,
) -> Result<PathBuf, ProcessError> {
    let suffix = file_name
        .split_once(SERIES_SEPARATOR)
        .map(|(_, rest)| rest)
        .ok_or_else(|| ProcessError::BadFileName(file_name.to_owned()))?;
    let output_path = output_dir.join(format!("{series_uid}{SERIES_SEPARATOR}{suffix}"));

    let object = open_file(input_dir.join(file_name))?;
    let transfer_syntax = object.meta().transfer_syntax().to_owned();
    let mut dataset = object.into_inner();

    let sop_class_uid = required_str(&dataset, tags::SOP_CLASS_UID, "SOPClassUID")?;
    let series_number = required_int(&dataset, tags::SERIES_NUMBER, "SeriesNumber")?;
    let description = optional_str(&dataset, tags::SERIES_DESCRIPTION).unwrap_or_default();
    let sop_instance_uid = uids.fresh();

    let grid = PixelGrid::from_dataset(&dataset)?;
    let smoothed = grid.smoothed(settings.sigma as f64);
    log::debug!(
        "{file_name}: smoothed {}x{} grid with sigma {}",
        grid.dim().0,
        grid.dim().1,
        settings.sigma
    );

    dataset.put(DataElement::new(
        tags::SERIES_INSTANCE_UID,
        VR::UI,
        PrimitiveValue::from(series_uid),
    ));
    dataset.put(DataElement::new(
        tags::SOP_INSTANCE_UID,
        VR::UI,
        PrimitiveValue::from(sop_instance_uid.as_str()),
    ));
    dataset.put(DataElement::new(
        tags::SERIES_NUMBER,
        VR::IS,
        PrimitiveValue::from((series_number + settings.series_offset).to_string()),
    ));
    dataset.put(DataElement::new(
        tags::SERIES_DESCRIPTION,
        VR::LO,
        PrimitiveValue::from(format!("FILTER({description})")),
    ));
    let (pixel_vr, pixel_payload) = smoothed.to_pixel_payload();
    dataset.put(DataElement::new(tags::PIXEL_DATA, pixel_vr, pixel_payload));

    let file_object = dataset
        .with_meta(
            FileMetaTableBuilder::new()
                .transfer_syntax(&transfer_syntax)
                .media_storage_sop_class_uid(&sop_class_uid)
                .media_storage_sop_instance_uid(&sop_instance_uid),
        )
        .map_err(|err| ProcessError::Meta(err.to_string()))?;
    file_object.write_to_file(&output_path)?;

    Ok(output_path)
}

fn required_str(
    dataset: &InMemDicomObject,
    tag: Tag,
    name: &'static str,
) -> Result<String, ProcessError> {
    dataset
        .element(tag)
        .map_err(|_| ProcessError::MissingAttribute(name))?
        .to_str()
        .map(|value| value.into_owned())
        .map_err(|err| ProcessError::InvalidAttribute {
            name,
            message: err.to_string(),
        })
}

fn required_int(
    dataset: &InMemDicomObject,
    tag: Tag,
    name: &'static str,
) -> Result<i64, ProcessError> {
    dataset
        .element(tag)
        .map_err(|_| ProcessError::MissingAttribute(name))?
        .to_int::<i64>()
        .map_err(|err| ProcessError::InvalidAttribute {
            name,
            message: err.to_string(),
        })
}

fn optional_str(dataset: &InMemDicomObject, tag: Tag) -> Option<String> {
    dataset
        .element(tag)
        .ok()
        .and_then(|element| element.to_str().ok())
        .map(|value| value.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uid::RandomUid;

    use dicom_dictionary_std::uids;

    fn sample_slice(series_uid: &str, sop_uid: &str) -> InMemDicomObject {
        let pixels: Vec<u16> = (0..16).map(|v| v * 100).collect();
        InMemDicomObject::from_element_iter([
            DataElement::new(
                tags::SOP_CLASS_UID,
                VR::UI,
                PrimitiveValue::from(uids::MR_IMAGE_STORAGE),
            ),
            DataElement::new(tags::SOP_INSTANCE_UID, VR::UI, PrimitiveValue::from(sop_uid)),
            DataElement::new(
                tags::SERIES_INSTANCE_UID,
                VR::UI,
                PrimitiveValue::from(series_uid),
            ),
            DataElement::new(tags::SERIES_NUMBER, VR::IS, PrimitiveValue::from("4")),
            DataElement::new(
                tags::SERIES_DESCRIPTION,
                VR::LO,
                PrimitiveValue::from("T1 axial"),
            ),
            DataElement::new(tags::ROWS, VR::US, PrimitiveValue::from(4_u16)),
            DataElement::new(tags::COLUMNS, VR::US, PrimitiveValue::from(4_u16)),
            DataElement::new(tags::SAMPLES_PER_PIXEL, VR::US, PrimitiveValue::from(1_u16)),
            DataElement::new(tags::BITS_ALLOCATED, VR::US, PrimitiveValue::from(16_u16)),
            DataElement::new(
                tags::PIXEL_REPRESENTATION,
                VR::US,
                PrimitiveValue::from(0_u16),
            ),
            DataElement::new(tags::PIXEL_DATA, VR::OW, PrimitiveValue::U16(pixels.into())),
        ])
    }

    fn write_slice(dir: &Path, name: &str, dataset: InMemDicomObject) {
        let sop_uid = dataset
            .element(tags::SOP_INSTANCE_UID)
            .unwrap()
            .to_str()
            .unwrap()
            .into_owned();
        dataset
            .with_meta(
                FileMetaTableBuilder::new()
                    .transfer_syntax(uids::EXPLICIT_VR_LITTLE_ENDIAN)
                    .media_storage_sop_class_uid(uids::MR_IMAGE_STORAGE)
                    .media_storage_sop_instance_uid(sop_uid),
            )
            .unwrap()
            .write_to_file(dir.join(name))
            .unwrap();
    }

    #[test]
    fn transformed_slice_is_retagged_and_offset() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_slice(input.path(), "S1#I1.dcm", sample_slice("S1", "I1"));

        let settings = Settings::default();
        let out_path = process_slice(
            input.path(),
            "S1#I1.dcm",
            output.path(),
            "2.25.111",
            &settings,
            &RandomUid,
        )
        .unwrap();

        assert_eq!(
            out_path.file_name().unwrap().to_str().unwrap(),
            "2.25.111#I1.dcm"
        );
        let result = open_file(&out_path).unwrap();
        assert_eq!(
            result.element(tags::SERIES_INSTANCE_UID).unwrap().to_str().unwrap(),
            "2.25.111"
        );
        assert_eq!(
            result.element(tags::SERIES_NUMBER).unwrap().to_int::<i64>().unwrap(),
            1004
        );
        assert_eq!(
            result.element(tags::SERIES_DESCRIPTION).unwrap().to_str().unwrap(),
            "FILTER(T1 axial)"
        );
        // Fresh SOP instance UID, mirrored into the file meta.
        let new_sop = result.element(tags::SOP_INSTANCE_UID).unwrap().to_str().unwrap();
        assert_ne!(new_sop, "I1");
        assert_eq!(
            result.meta().media_storage_sop_instance_uid.trim_end_matches('\0'),
            new_sop
        );
    }

    #[test]
    fn zero_sigma_keeps_pixels_identical() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_slice(input.path(), "S1#I1.dcm", sample_slice("S1", "I1"));

        let settings = Settings {
            sigma: 0,
            ..Settings::default()
        };
        let out_path = process_slice(
            input.path(),
            "S1#I1.dcm",
            output.path(),
            "2.25.222",
            &settings,
            &RandomUid,
        )
        .unwrap();

        let result = open_file(&out_path).unwrap();
        let grid = PixelGrid::from_dataset(&result.into_inner()).unwrap();
        let expected: Vec<f64> = (0..16).map(|v| (v * 100) as f64).collect();
        assert_eq!(grid.samples.iter().cloned().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn smoothing_preserves_shape_and_type() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_slice(input.path(), "S1#I1.dcm", sample_slice("S1", "I1"));

        let out_path = process_slice(
            input.path(),
            "S1#I1.dcm",
            output.path(),
            "2.25.333",
            &Settings::default(),
            &RandomUid,
        )
        .unwrap();

        let result = open_file(&out_path).unwrap().into_inner();
        assert_eq!(result.element(tags::ROWS).unwrap().to_int::<u16>().unwrap(), 4);
        assert_eq!(
            result.element(tags::BITS_ALLOCATED).unwrap().to_int::<u16>().unwrap(),
            16
        );
        let grid = PixelGrid::from_dataset(&result).unwrap();
        assert_eq!(grid.dim(), (4, 4));
    }

    #[test]
    fn filename_without_separator_is_rejected() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let err = process_slice(
            input.path(),
            "plain.dcm",
            output.path(),
            "2.25.444",
            &Settings::default(),
            &RandomUid,
        )
        .unwrap_err();
        assert!(matches!(err, ProcessError::BadFileName(_)));
    }
}
