use std::fs;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use dicom_core::{DataElement, PrimitiveValue, VR};
use dicom_dictionary_std::tags;
use dicom_object::{FileDicomObject, FileMetaTableBuilder, StandardDataDictionary};

use dicom_bids::error::BidsError;
use dicom_bids::header::{DicomHeader, HeaderSource};

fn dicom_with_echo_time(path: &Utf8PathBuf) {
    let meta = FileMetaTableBuilder::new()
        .transfer_syntax("1.2.840.10008.1.2.1")
        .media_storage_sop_class_uid("1.2.840.10008.5.1.4.1.1.4")
        .media_storage_sop_instance_uid("1.2.826.0.1.3680043.2.1125.2")
        .build()
        .unwrap();
    let mut obj = FileDicomObject::new_empty_with_dict_and_meta(StandardDataDictionary, meta);
    obj.put(DataElement::new(tags::ECHO_TIME, VR::DS, PrimitiveValue::from("4.5")));
    obj.put(DataElement::new(tags::MODALITY, VR::CS, PrimitiveValue::from("MR")));
    obj.write_to_file(path.as_std_path()).unwrap();
}

#[test]
fn reads_header_by_keyword() {
    let temp = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(temp.path().join("MR0001")).unwrap();
    dicom_with_echo_time(&path);

    let header = DicomHeader::open(&path).unwrap();
    assert_eq!(header.path(), path.as_path());
    assert_eq!(header.numbers("EchoTime"), Some(vec![4.5]));
    assert_eq!(header.text("Modality"), Some("MR".to_string()));
    assert_eq!(header.numbers("RepetitionTime"), None);
    assert_eq!(header.text("NotARealKeyword"), None);
}

#[test]
fn non_dicom_file_is_reported() {
    let temp = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(temp.path().join("MR_notes.txt")).unwrap();
    fs::write(path.as_std_path(), b"plain text").unwrap();
    let err = DicomHeader::open(&path).err().unwrap();
    assert_matches!(err, BidsError::DicomRead { .. });
}
