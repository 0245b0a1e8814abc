//! Structured Report synthesis.
//!
//! For every processed series, one Basic Text SR document is written that
//! summarizes the applied filter and points back at the first image of the
//! series as evidence. The document content is assembled as a small tree of
//! typed nodes so that all coded-entry constants live in one place and can
//! be audited against PS3.16 in one read.
//!
//! The measurement container holds fixed example values. It is placeholder
//! content demonstrating the NUM node layout and is not derived from any
//! image analysis.

use std::path::{Path, PathBuf};

use crate::series::{DICOM_EXTENSION, SERIES_SEPARATOR};
use crate::settings::Settings;
use crate::uid::UidSource;

use dicom::core::{DataElement, PrimitiveValue, Tag, VR};
use dicom::core::value::DataSetSequence;
use dicom::object::{FileMetaTableBuilder, InMemDicomObject, ReadError, WriteError, open_file};
use dicom_dictionary_std::{tags, uids};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("cannot read reference image: {0}")]
    Read(#[from] ReadError),

    #[error("DICOM write error: {0}")]
    Write(#[from] WriteError),

    #[error("reference image lacks required attribute {0}")]
    MissingAttribute(&'static str),

    #[error("cannot read reference attribute {name}: {message}")]
    InvalidAttribute { name: &'static str, message: String },

    #[error("cannot build file meta: {0}")]
    Meta(String),
}

/// A coded entry: value, coding scheme designator, meaning.
#[derive(Debug, Clone, Copy)]
pub struct Code {
    pub value: &'static str,
    pub scheme: &'static str,
    pub meaning: &'static str,
}

/// Document title code (LOINC).
const RADIOLOGY_REPORT: Code = Code {
    value: "11528-7",
    scheme: "LN",
    meaning: "Radiology Report",
};

/// Concept name for the processing-description text node.
const PROCESSING_DESCRIPTION: Code = Code {
    value: "121106",
    scheme: "DCM",
    meaning: "Processing Description",
};

/// Concept name for the placeholder measurement container.
const MEASUREMENT_GROUP: Code = Code {
    value: "125007",
    scheme: "DCM",
    meaning: "Measurement Group",
};

const DISTANCE: Code = Code {
    value: "121206",
    scheme: "DCM",
    meaning: "Distance",
};

const PATH_LENGTH: Code = Code {
    value: "121211",
    scheme: "DCM",
    meaning: "Path length",
};

const MILLIMETER: Code = Code {
    value: "mm",
    scheme: "UCUM",
    meaning: "millimeter",
};

const MANUFACTURER: &str = "DICOM Smooth Module";

/// One node of the SR content tree.
///
/// Only the node kinds this document needs are modeled: containers, free
/// text, and numeric measurements. Every node is attached to its parent
/// with the CONTAINS relationship.
pub enum ContentNode {
    Container {
        concept: Code,
        children: Vec<ContentNode>,
    },
    Text {
        concept: Code,
        text: String,
    },
    Num {
        concept: Code,
        value: String,
        units: Code,
    },
}

impl ContentNode {
    pub fn container(concept: Code, children: Vec<ContentNode>) -> Self {
        ContentNode::Container { concept, children }
    }

    pub fn text(concept: Code, text: impl Into<String>) -> Self {
        ContentNode::Text {
            concept,
            text: text.into(),
        }
    }

    pub fn num(concept: Code, value: impl Into<String>, units: Code) -> Self {
        ContentNode::Num {
            concept,
            value: value.into(),
            units,
        }
    }

    /// Renders this node as a content-sequence item.
    fn into_item(self) -> InMemDicomObject {
        match self {
            ContentNode::Container { concept, children } => {
                InMemDicomObject::from_element_iter([
                    DataElement::new(
                        tags::RELATIONSHIP_TYPE,
                        VR::CS,
                        PrimitiveValue::from("CONTAINS"),
                    ),
                    DataElement::new(tags::VALUE_TYPE, VR::CS, PrimitiveValue::from("CONTAINER")),
                    concept_name_element(concept),
                    DataElement::new(
                        tags::CONTINUITY_OF_CONTENT,
                        VR::CS,
                        PrimitiveValue::from("SEPARATE"),
                    ),
                    content_sequence_element(children),
                ])
            }
            ContentNode::Text { concept, text } => InMemDicomObject::from_element_iter([
                DataElement::new(
                    tags::RELATIONSHIP_TYPE,
                    VR::CS,
                    PrimitiveValue::from("CONTAINS"),
                ),
                DataElement::new(tags::VALUE_TYPE, VR::CS, PrimitiveValue::from("TEXT")),
                concept_name_element(concept),
                DataElement::new(tags::TEXT_VALUE, VR::UT, PrimitiveValue::from(text)),
            ]),
            ContentNode::Num {
                concept,
                value,
                units,
            } => {
                let measured_value = InMemDicomObject::from_element_iter([
                    DataElement::new(tags::NUMERIC_VALUE, VR::DS, PrimitiveValue::from(value)),
                    DataElement::new(
                        tags::MEASUREMENT_UNITS_CODE_SEQUENCE,
                        VR::SQ,
                        DataSetSequence::from(vec![code_item(units)]),
                    ),
                ]);
                InMemDicomObject::from_element_iter([
                    DataElement::new(
                        tags::RELATIONSHIP_TYPE,
                        VR::CS,
                        PrimitiveValue::from("CONTAINS"),
                    ),
                    DataElement::new(tags::VALUE_TYPE, VR::CS, PrimitiveValue::from("NUM")),
                    concept_name_element(concept),
                    DataElement::new(
                        tags::MEASURED_VALUE_SEQUENCE,
                        VR::SQ,
                        DataSetSequence::from(vec![measured_value]),
                    ),
                ])
            }
        }
    }
}

fn code_item(code: Code) -> InMemDicomObject {
    InMemDicomObject::from_element_iter([
        DataElement::new(tags::CODE_VALUE, VR::SH, PrimitiveValue::from(code.value)),
        DataElement::new(
            tags::CODING_SCHEME_DESIGNATOR,
            VR::SH,
            PrimitiveValue::from(code.scheme),
        ),
        DataElement::new(tags::CODE_MEANING, VR::LO, PrimitiveValue::from(code.meaning)),
    ])
}

fn concept_name_element(code: Code) -> DataElement<InMemDicomObject> {
    DataElement::new(
        tags::CONCEPT_NAME_CODE_SEQUENCE,
        VR::SQ,
        DataSetSequence::from(vec![code_item(code)]),
    )
}

fn content_sequence_element(children: Vec<ContentNode>) -> DataElement<InMemDicomObject> {
    let items: Vec<InMemDicomObject> = children.into_iter().map(ContentNode::into_item).collect();
    DataElement::new(tags::CONTENT_SEQUENCE, VR::SQ, DataSetSequence::from(items))
}

/// Document body: the filter summary plus the inert example measurements.
fn document_content(settings: &Settings) -> Vec<ContentNode> {
    vec![
        ContentNode::text(
            PROCESSING_DESCRIPTION,
            format!("Image processed with Gaussian filter (sigma={})", settings.sigma),
        ),
        ContentNode::container(
            MEASUREMENT_GROUP,
            vec![
                ContentNode::num(DISTANCE, "25.5", MILLIMETER),
                ContentNode::num(PATH_LENGTH, "42.0", MILLIMETER),
            ],
        ),
    ]
}

/// Assembles the SR dataset for one reference image.
///
/// Demographics and study linkage are copied verbatim from the reference;
/// the evidence sequence records which instance the document was derived
/// from.
pub fn build_report(
    reference: &InMemDicomObject,
    series_uid: &str,
    sop_instance_uid: &str,
    settings: &Settings,
) -> Result<InMemDicomObject, ReportError> {
    let ref_study_uid = required_str(reference, tags::STUDY_INSTANCE_UID, "StudyInstanceUID")?;
    let ref_series_uid = required_str(reference, tags::SERIES_INSTANCE_UID, "SeriesInstanceUID")?;
    let ref_sop_uid = required_str(reference, tags::SOP_INSTANCE_UID, "SOPInstanceUID")?;
    let ref_sop_class = required_str(reference, tags::SOP_CLASS_UID, "SOPClassUID")?;
    let series_number = required_int(reference, tags::SERIES_NUMBER, "SeriesNumber")?;
    let patient_name = required_str(reference, tags::PATIENT_NAME, "PatientName")?;
    let patient_id = required_str(reference, tags::PATIENT_ID, "PatientID")?;
    let study_date = required_str(reference, tags::STUDY_DATE, "StudyDate")?;
    let study_time = required_str(reference, tags::STUDY_TIME, "StudyTime")?;
    let accession_number = required_str(reference, tags::ACCESSION_NUMBER, "AccessionNumber")?;

    let evidence_sop = InMemDicomObject::from_element_iter([
        DataElement::new(
            tags::REFERENCED_SOP_CLASS_UID,
            VR::UI,
            PrimitiveValue::from(ref_sop_class.as_str()),
        ),
        DataElement::new(
            tags::REFERENCED_SOP_INSTANCE_UID,
            VR::UI,
            PrimitiveValue::from(ref_sop_uid.as_str()),
        ),
    ]);
    let evidence_series = InMemDicomObject::from_element_iter([
        DataElement::new(
            tags::SERIES_INSTANCE_UID,
            VR::UI,
            PrimitiveValue::from(ref_series_uid.as_str()),
        ),
        DataElement::new(
            tags::REFERENCED_SOP_SEQUENCE,
            VR::SQ,
            DataSetSequence::from(vec![evidence_sop]),
        ),
    ]);
    let evidence_study = InMemDicomObject::from_element_iter([
        DataElement::new(
            tags::STUDY_INSTANCE_UID,
            VR::UI,
            PrimitiveValue::from(ref_study_uid.as_str()),
        ),
        DataElement::new(
            tags::REFERENCED_SERIES_SEQUENCE,
            VR::SQ,
            DataSetSequence::from(vec![evidence_series]),
        ),
    ]);

    let template = InMemDicomObject::from_element_iter([
        DataElement::new(tags::MAPPING_RESOURCE, VR::CS, PrimitiveValue::from("DCMR")),
        DataElement::new(tags::TEMPLATE_IDENTIFIER, VR::CS, PrimitiveValue::from("2000")),
    ]);

    let dataset = InMemDicomObject::from_element_iter([
        DataElement::new(
            tags::SPECIFIC_CHARACTER_SET,
            VR::CS,
            PrimitiveValue::from("ISO_IR 100"),
        ),
        DataElement::new(
            tags::SOP_CLASS_UID,
            VR::UI,
            PrimitiveValue::from(uids::BASIC_TEXT_SR_STORAGE),
        ),
        DataElement::new(
            tags::SOP_INSTANCE_UID,
            VR::UI,
            PrimitiveValue::from(sop_instance_uid),
        ),
        DataElement::new(
            tags::SERIES_INSTANCE_UID,
            VR::UI,
            PrimitiveValue::from(series_uid),
        ),
        DataElement::new(
            tags::STUDY_INSTANCE_UID,
            VR::UI,
            PrimitiveValue::from(ref_study_uid.as_str()),
        ),
        DataElement::new(
            tags::SERIES_NUMBER,
            VR::IS,
            PrimitiveValue::from((series_number + settings.series_offset).to_string()),
        ),
        DataElement::new(
            tags::SERIES_DESCRIPTION,
            VR::LO,
            PrimitiveValue::from("SR Report"),
        ),
        DataElement::new(tags::MODALITY, VR::CS, PrimitiveValue::from("SR")),
        DataElement::new(tags::MANUFACTURER, VR::LO, PrimitiveValue::from(MANUFACTURER)),
        DataElement::new(tags::INSTANCE_NUMBER, VR::IS, PrimitiveValue::from("1")),
        DataElement::new(
            tags::CONTENT_DATE,
            VR::DA,
            PrimitiveValue::from(study_date.as_str()),
        ),
        DataElement::new(
            tags::CONTENT_TIME,
            VR::TM,
            PrimitiveValue::from(study_time.as_str()),
        ),
        DataElement::new(
            tags::INSTANCE_CREATION_DATE,
            VR::DA,
            PrimitiveValue::from(study_date.as_str()),
        ),
        DataElement::new(
            tags::INSTANCE_CREATION_TIME,
            VR::TM,
            PrimitiveValue::from(study_time.as_str()),
        ),
        DataElement::new(tags::TIMEZONE_OFFSET_FROM_UTC, VR::SH, PrimitiveValue::Empty),
        DataElement::new(tags::COMPLETION_FLAG, VR::CS, PrimitiveValue::from("COMPLETE")),
        DataElement::new(
            tags::VERIFICATION_FLAG,
            VR::CS,
            PrimitiveValue::from("UNVERIFIED"),
        ),
        DataElement::new(tags::PRELIMINARY_FLAG, VR::CS, PrimitiveValue::Empty),
        DataElement::new(
            tags::PATIENT_NAME,
            VR::PN,
            PrimitiveValue::from(patient_name.as_str()),
        ),
        DataElement::new(
            tags::PATIENT_ID,
            VR::LO,
            PrimitiveValue::from(patient_id.as_str()),
        ),
        DataElement::new(tags::STUDY_DATE, VR::DA, PrimitiveValue::from(study_date.as_str())),
        DataElement::new(tags::STUDY_TIME, VR::TM, PrimitiveValue::from(study_time.as_str())),
        DataElement::new(
            tags::ACCESSION_NUMBER,
            VR::SH,
            PrimitiveValue::from(accession_number.as_str()),
        ),
        // Root container of the document content.
        DataElement::new(tags::VALUE_TYPE, VR::CS, PrimitiveValue::from("CONTAINER")),
        DataElement::new(
            tags::CONTINUITY_OF_CONTENT,
            VR::CS,
            PrimitiveValue::from("SEPARATE"),
        ),
        concept_name_element(RADIOLOGY_REPORT),
        DataElement::new(
            tags::OBSERVATION_DATE_TIME,
            VR::DT,
            PrimitiveValue::from(format!("{study_date}{study_time}")),
        ),
        DataElement::new(tags::OBSERVER_TYPE, VR::CS, PrimitiveValue::from("DEVICE")),
        DataElement::new(
            tags::CONTENT_TEMPLATE_SEQUENCE,
            VR::SQ,
            DataSetSequence::from(vec![template]),
        ),
        content_sequence_element(document_content(settings)),
        DataElement::new(
            tags::CURRENT_REQUESTED_PROCEDURE_EVIDENCE_SEQUENCE,
            VR::SQ,
            DataSetSequence::from(vec![evidence_study]),
        ),
    ]);

    Ok(dataset)
}

/// Reads the reference image and writes the finished SR document.
///
/// The output filename is `<seriesUID>#<sopInstanceUID>.dcm`, mirroring
/// the slice naming convention.
pub fn create_report(
    input_dir: &Path,
    reference_file: &str,
    output_dir: &Path,
    series_uid: &str,
    settings: &Settings,
    uids_source: &dyn UidSource,
) -> Result<PathBuf, ReportError> {
    let reference = open_file(input_dir.join(reference_file))?.into_inner();
    let sop_instance_uid = uids_source.fresh();
    let dataset = build_report(&reference, series_uid, &sop_instance_uid, settings)?;

    let file_object = dataset
        .with_meta(
            FileMetaTableBuilder::new()
                .transfer_syntax(uids::EXPLICIT_VR_LITTLE_ENDIAN)
                .media_storage_sop_class_uid(uids::BASIC_TEXT_SR_STORAGE)
                .media_storage_sop_instance_uid(&sop_instance_uid),
        )
        .map_err(|err| ReportError::Meta(err.to_string()))?;
    let output_path =
        output_dir.join(format!("{series_uid}{SERIES_SEPARATOR}{sop_instance_uid}{DICOM_EXTENSION}"));
    file_object.write_to_file(&output_path)?;
    log::info!("wrote report {}", output_path.display());

    Ok(output_path)
}

fn required_str(
    dataset: &InMemDicomObject,
    tag: Tag,
    name: &'static str,
) -> Result<String, ReportError> {
    dataset
        .element(tag)
        .map_err(|_| ReportError::MissingAttribute(name))?
        .to_str()
        .map(|value| value.into_owned())
        .map_err(|err| ReportError::InvalidAttribute {
            name,
            message: err.to_string(),
        })
}

fn required_int(
    dataset: &InMemDicomObject,
    tag: Tag,
    name: &'static str,
) -> Result<i64, ReportError> {
    dataset
        .element(tag)
        .map_err(|_| ReportError::MissingAttribute(name))?
        .to_int::<i64>()
        .map_err(|err| ReportError::InvalidAttribute {
            name,
            message: err.to_string(),
        })
}
