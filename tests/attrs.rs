use nfs4_mamont::protocol::nfs::v4::attrs::decode_set_attributes;
use nfs4_mamont::store::SetAttributes;
use nfs4_mamont::xdr::nfs4::attr::{self, Attribute};
use nfs4_mamont::xdr::nfs4::{
    bitmap4, fattr4, fsid4, nfs_fh4, nfs_ftype4, nfsstat4, nfstime4, settime4, NFS4_FHSIZE,
};
use nfs4_mamont::xdr::{self, Serialize};

#[test]
fn encodes_in_identifier_order() {
    let values = vec![
        Attribute::Mode(0o755),
        Attribute::Type(nfs_ftype4::NF4DIR),
        Attribute::Size(4096),
    ];
    let encoded = attr::encode_attributes(values).expect("encode");
    assert_eq!(
        encoded.attrmask,
        bitmap4::from_ids(&[attr::FATTR4_TYPE, attr::FATTR4_SIZE, attr::FATTR4_MODE])
    );

    let mut expected = Vec::new();
    nfs_ftype4::NF4DIR.serialize(&mut expected).expect("serialize");
    4096_u64.serialize(&mut expected).expect("serialize");
    0o755_u32.serialize(&mut expected).expect("serialize");
    assert_eq!(encoded.attr_vals, expected);

    assert_eq!(
        attr::decode_attributes(&encoded).expect("decode"),
        vec![
            Attribute::Type(nfs_ftype4::NF4DIR),
            Attribute::Size(4096),
            Attribute::Mode(0o755),
        ]
    );
}

fn every_attribute() -> Vec<Attribute> {
    let time = |seconds| nfstime4 { seconds, nseconds: 999_999_999 };
    vec![
        Attribute::SupportedAttrs(attr::supported_attributes()),
        Attribute::Type(nfs_ftype4::NF4REG),
        Attribute::FhExpireType(attr::FH4_PERSISTENT),
        Attribute::Change(0x0123_4567_89ab_cdef),
        Attribute::Size(u64::MAX),
        Attribute::LinkSupport(false),
        Attribute::SymlinkSupport(true),
        Attribute::NamedAttr(false),
        Attribute::Fsid(fsid4 { major: 7, minor: 9 }),
        Attribute::UniqueHandles(true),
        Attribute::LeaseTime(90),
        Attribute::RdattrError(nfsstat4::NFS4ERR_STALE),
        Attribute::FileHandle(nfs_fh4(vec![0xaa; 16])),
        Attribute::FileId(42),
        Attribute::MaxFileSize(i64::MAX as u64),
        Attribute::MaxName(255),
        Attribute::MaxRead(1 << 20),
        Attribute::MaxWrite(1 << 20),
        Attribute::Mode(0o4755),
        Attribute::NumLinks(3),
        Attribute::Owner("1000".to_string()),
        Attribute::OwnerGroup("wheel@example.org".to_string()),
        Attribute::SpaceUsed(8192),
        Attribute::TimeAccess(time(-5)),
        Attribute::TimeAccessSet(settime4::SET_TO_CLIENT_TIME4(time(1_700_000_000))),
        Attribute::TimeMetadata(time(1)),
        Attribute::TimeModify(time(2)),
        Attribute::TimeModifySet(settime4::SET_TO_SERVER_TIME4),
        Attribute::MountedOnFileId(43),
    ]
}

#[test]
fn every_attribute_survives_encoding() {
    let values = every_attribute();
    for value in &values {
        let encoded = attr::encode_attributes(vec![value.clone()]).expect("encode");
        assert_eq!(encoded.attrmask, bitmap4::from_ids(&[value.id()]));
        assert_eq!(attr::decode_attributes(&encoded), Ok(vec![value.clone()]), "{value:?}");
    }

    let mut reversed = values.clone();
    reversed.reverse();
    let encoded = attr::encode_attributes(reversed).expect("encode");
    assert_eq!(attr::decode_attributes(&encoded), Ok(values));
}

#[test]
fn file_handles_are_bounded() {
    let mut buf = Vec::new();
    nfs_fh4(vec![1; NFS4_FHSIZE]).serialize(&mut buf).expect("serialize");
    let fh = xdr::deserialize::<nfs_fh4>(&mut buf.as_slice()).expect("largest handle");
    assert_eq!(fh.as_bytes().len(), NFS4_FHSIZE);

    let mut buf = Vec::new();
    nfs_fh4(vec![1; NFS4_FHSIZE + 1]).serialize(&mut buf).expect("serialize");
    assert!(xdr::deserialize::<nfs_fh4>(&mut buf.as_slice()).is_err());
}

#[test]
fn bitmap_spans_words() {
    let map = bitmap4::from_ids(&[attr::FATTR4_TYPE, attr::FATTR4_MODE, attr::FATTR4_TIME_MODIFY]);
    assert_eq!(map.0.len(), 2);
    assert!(map.is_set(attr::FATTR4_MODE));
    assert!(!map.is_set(attr::FATTR4_SIZE));
    assert!(!map.is_set(200));
    assert_eq!(
        map.ids().collect::<Vec<_>>(),
        vec![attr::FATTR4_TYPE, attr::FATTR4_MODE, attr::FATTR4_TIME_MODIFY]
    );

    let narrowed = map.intersection(&bitmap4::from_ids(&[attr::FATTR4_TYPE]));
    assert_eq!(narrowed.0.len(), 1);
    assert!(bitmap4::new().is_empty());
}

#[test]
fn requested_attributes_drop_unknown_ids() {
    let request = bitmap4::from_ids(&[attr::FATTR4_SIZE, 12, 90]);
    assert_eq!(attr::requested_attributes(&request), bitmap4::from_ids(&[attr::FATTR4_SIZE]));
}

#[test]
fn rejects_trailing_or_missing_bytes() {
    let mut encoded = attr::encode_attributes(vec![Attribute::Size(1)]).expect("encode");
    encoded.attr_vals.extend_from_slice(&[0, 0, 0, 0]);
    assert_eq!(attr::decode_attributes(&encoded), Err(nfsstat4::NFS4ERR_BADXDR));

    let short = fattr4 { attrmask: bitmap4::from_ids(&[attr::FATTR4_SIZE]), attr_vals: vec![0; 4] };
    assert_eq!(attr::decode_attributes(&short), Err(nfsstat4::NFS4ERR_BADXDR));
}

#[test]
fn unknown_attribute_is_not_supported() {
    let unknown = fattr4 { attrmask: bitmap4::from_ids(&[12]), attr_vals: vec![0; 4] };
    assert_eq!(attr::decode_attributes(&unknown), Err(nfsstat4::NFS4ERR_ATTRNOTSUPP));
    assert_eq!(attr::decode_settable_attributes(&unknown), Err(nfsstat4::NFS4ERR_ATTRNOTSUPP));
}

#[test]
fn read_only_attribute_cannot_be_set() {
    let encoded = attr::encode_attributes(vec![Attribute::Change(5)]).expect("encode");
    assert_eq!(attr::decode_settable_attributes(&encoded), Err(nfsstat4::NFS4ERR_INVAL));
}

#[test]
fn decodes_set_attributes() {
    let time = nfstime4 { seconds: 1_700_000_000, nseconds: 5 };
    let encoded = attr::encode_attributes(vec![
        Attribute::Size(10),
        Attribute::Mode(0o100644),
        Attribute::Owner("42".to_string()),
        Attribute::OwnerGroup("7@example.com".to_string()),
        Attribute::TimeAccessSet(settime4::SET_TO_SERVER_TIME4),
        Attribute::TimeModifySet(settime4::SET_TO_CLIENT_TIME4(time)),
    ])
    .expect("encode");

    let (changes, applied) = decode_set_attributes(&encoded).expect("decode");
    assert_eq!(
        changes,
        SetAttributes {
            size: Some(10),
            mode: Some(0o644),
            uid: Some(42),
            gid: Some(7),
            atime: Some(settime4::SET_TO_SERVER_TIME4),
            mtime: Some(settime4::SET_TO_CLIENT_TIME4(time)),
        }
    );
    assert_eq!(applied, encoded.attrmask);
}

#[test]
fn rejects_symbolic_owner() {
    let encoded =
        attr::encode_attributes(vec![Attribute::Owner("alice@example.com".to_string())])
            .expect("encode");
    assert_eq!(decode_set_attributes(&encoded), Err(nfsstat4::NFS4ERR_BADOWNER));
}

#[test]
fn empty_set_attributes_change_nothing() {
    let (changes, applied) = decode_set_attributes(&fattr4::default()).expect("decode");
    assert!(changes.is_empty());
    assert!(applied.is_empty());
}
