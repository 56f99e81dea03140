//! Integration tests chaining the formats the way a storage reader does
//!
//! `.build.info` names a build config, the config names the encoding table
//! and the roots, and every stored file is BLTE framed. The fixtures are
//! generated with the builders and written to a temporary directory.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use casc_reader_crypto::{ContentKey, EncodingKey, FileDataId};
use casc_reader_formats::blte::{self, BlteBuilder, CompressionMode};
use casc_reader_formats::bpsv;
use casc_reader_formats::config::BuildConfig;
use casc_reader_formats::encoding::{EncodingBuilder, EncodingFile};
use casc_reader_formats::listfile::Listfile;
use casc_reader_formats::root::{ContentFlags, LocaleFlags, RootBuilder, RootFile, RootVersion};
use casc_reader_formats::tvfs::{TvfsBuilder, TvfsFile};
use casc_reader_formats::CascFormat;
use pretty_assertions::assert_eq;
use std::path::Path;

fn ckey(n: u8) -> ContentKey {
    ContentKey::from_bytes([n; 16])
}

fn ekey(n: u8) -> EncodingKey {
    EncodingKey::from_bytes([n; 16])
}

fn write_blte(dir: &Path, name: &str, data: &[u8]) {
    let framed = BlteBuilder::new()
        .add_data(data, 1024, CompressionMode::ZLib)
        .build()
        .expect("blte build");
    std::fs::write(dir.join(name), framed).expect("write fixture");
}

fn read_blte(dir: &Path, name: &str) -> Vec<u8> {
    let framed = std::fs::read(dir.join(name)).expect("read fixture");
    assert!(blte::is_blte(&framed));
    blte::decode(&framed).expect("blte decode")
}

#[test]
fn build_info_selects_config_by_product() {
    let text = "Branch!STRING:0|Build Key!HEX:16|Product!STRING:0\n\
                ## seqn = 7\n\
                us|00112233445566778899aabbccddeeff|wow_classic\n\
                us|ffeeddccbbaa99887766554433221100|wow\n";
    let doc = bpsv::parse(text).expect("bpsv");
    assert_eq!(doc.sequence_number(), Some(7));

    let row = doc.find_row("Product", "wow").expect("wow row");
    assert_eq!(
        doc.get(row, "Build Key"),
        Some("ffeeddccbbaa99887766554433221100")
    );
    assert!(doc.find_row("Product", "wowt").is_none());
}

#[test]
fn encoding_and_root_resolve_file_data_id() {
    let dir = tempfile::tempdir().expect("tempdir");

    let mut encoding = EncodingBuilder::new();
    for n in 1..=40u8 {
        encoding = encoding
            .add_content(ckey(n), u64::from(n) * 100, vec![ekey(n)])
            .add_encoded(ekey(n), "z", u64::from(n) * 50);
    }
    write_blte(dir.path(), "encoding", &encoding.build().expect("encoding"));

    let mut root = RootBuilder::new(RootVersion::V2);
    for n in 1..=40u8 {
        root.add_file(
            FileDataId::new(u32::from(n) * 10),
            ckey(n),
            Some(&format!("World/File{n}.dat")),
            LocaleFlags::new(LocaleFlags::ENUS),
            ContentFlags::default(),
        );
    }
    write_blte(dir.path(), "root", &root.build().expect("root"));

    let encoding = EncodingFile::parse(&read_blte(dir.path(), "encoding")).expect("encoding");
    let root = <RootFile as CascFormat>::parse(&read_blte(dir.path(), "root")).expect("root");

    let content = root.find_by_id(FileDataId::new(170)).expect("fdid 170");
    assert_eq!(content, ckey(17));
    let entry = encoding.find_content(&content).expect("ckey entry");
    assert_eq!(entry.encoding_keys, vec![ekey(17)]);
    assert_eq!(entry.file_size, 1700);

    assert_eq!(root.find_by_path("world\\file3.dat"), Some(ckey(3)));
    assert_eq!(root.records_for_locale(LocaleFlags::DEDE).count(), 0);
}

#[test]
fn build_config_roots_parse_as_tvfs() {
    let dir = tempfile::tempdir().expect("tempdir");

    let mut tvfs = TvfsBuilder::new();
    tvfs.add_file("Data/enUS/readme.txt", ekey(9), 30, 64)
        .add_file("Data/enUS/credits.txt", ekey(8), 20, 48);
    write_blte(dir.path(), "vfs", &tvfs.build().expect("tvfs"));

    let mut config = BuildConfig::new();
    config
        .set("root", vec![ckey(1).to_hex()])
        .set("vfs-root", vec![ckey(2).to_hex(), ekey(2).to_hex()])
        .set("vfs-1", vec![ckey(3).to_hex(), ekey(3).to_hex()]);
    let config = BuildConfig::parse(&config.build()).expect("config");

    let roots = config.vfs_roots();
    assert_eq!(roots.len(), 2);
    assert_eq!(roots[0].name, "vfs-root");
    assert_eq!(roots[1].info.lookup_key(), ekey(3).to_hex());

    let tvfs = TvfsFile::parse(&read_blte(dir.path(), "vfs")).expect("tvfs");
    let file = tvfs.find("DATA/ENUS/README.TXT").expect("readme");
    assert_eq!(file.encoding_keys(), vec![ekey(9)]);
    assert_eq!(file.content_size(), 64);
}

#[test]
fn listfile_names_root_ids() {
    let listfile = Listfile::parse(b"10;World\\File1.dat\n20;World\\File2.dat\n");

    let mut root = RootBuilder::new(RootVersion::V3);
    root.add_file(
        FileDataId::new(10),
        ckey(1),
        None,
        LocaleFlags::default(),
        ContentFlags::default(),
    );
    let root = RootFile::parse(&root.build().expect("root")).expect("parse");

    let named: Vec<&str> = listfile
        .entries
        .iter()
        .filter(|(id, _)| root.find_by_id(*id).is_some())
        .map(|(_, path)| path.as_str())
        .collect();
    assert_eq!(named, vec!["world/file1.dat"]);
}
