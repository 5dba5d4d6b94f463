mod common;

use xbwt_index::{
    compress_document, decompress_document, CodecKind, Error, IndexConfig, Layout, XbwtIndex,
};

use common::{random_document, small_blocks, DBLP};

const DOCUMENTS: [&str; 5] = [
    "<a><b>x</b></a>",
    DBLP,
    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!DOCTYPE note>\n<note lang=\"en\">\n  <to>Tove</to>\n  <body>Don&apos;t <em>forget</em> me</body>\n</note>\n",
    "<r><![CDATA[<raw> & stuff]]><!-- comment --><p a=\"1\" b=\"2\"></p>tail</r>",
    "<top>one</top><top>two</top>",
];

#[test]
fn extraction_reproduces_every_document() {
    for codec in CodecKind::ALL {
        let config = small_blocks(codec);
        for doc in DOCUMENTS {
            let index = XbwtIndex::from_xml(doc.as_bytes(), &config).unwrap();
            let xml = index.extract_document().unwrap();
            assert_eq!(String::from_utf8(xml).unwrap(), doc, "codec {}", codec);
        }
    }
}

#[test]
fn subtree_of_the_root_is_the_document() {
    for doc in DOCUMENTS {
        let index = XbwtIndex::from_xml(doc.as_bytes(), &small_blocks(CodecKind::Zstd)).unwrap();
        let subtree = index.navigator().subtree_text(0).unwrap();
        assert_eq!(subtree.anchor, 0);
        assert_eq!(String::from_utf8(subtree.text).unwrap(), doc);
    }
}

#[test]
fn self_closing_tags_normalize() {
    let index = XbwtIndex::from_xml(b"<r><a/><b k=\"v\"/></r>", &IndexConfig::default()).unwrap();
    assert_eq!(
        index.extract_document().unwrap(),
        b"<r><a></a><b k=\"v\"></b></r>".to_vec()
    );
}

#[test]
fn images_reload_under_every_codec() {
    for codec in CodecKind::ALL {
        let config = small_blocks(codec);
        let built = XbwtIndex::from_xml(DBLP.as_bytes(), &config).unwrap();
        let image = built.to_bytes().unwrap();
        let loaded = XbwtIndex::from_bytes(&image, &config).unwrap();

        assert_eq!(loaded.summary(), built.summary());
        assert_eq!(loaded.extract_document().unwrap(), DBLP.as_bytes().to_vec());

        let query = ["<article", "<author", "=Ferragina"];
        let before = built.navigator().search(&query).unwrap();
        let after = loaded.navigator().search(&query).unwrap();
        assert_eq!(before, after);
        assert_eq!(after.occurrences, 2);
    }
}

#[test]
fn random_documents_survive_images() {
    let config = small_blocks(CodecKind::Deflate);
    for seed in 0..20 {
        let doc = random_document(seed, 40);
        let built = XbwtIndex::from_xml(doc.as_bytes(), &config).unwrap();
        let loaded = XbwtIndex::from_bytes(&built.to_bytes().unwrap(), &config).unwrap();
        assert_eq!(String::from_utf8(loaded.extract_document().unwrap()).unwrap(), doc, "seed {}", seed);
    }
}

#[test]
fn damaged_images_are_malformed() {
    let config = small_blocks(CodecKind::Zstd);
    let image = XbwtIndex::from_xml(DBLP.as_bytes(), &config).unwrap().to_bytes().unwrap();
    assert!(matches!(
        XbwtIndex::from_bytes(&image[..image.len() - 3], &config),
        Err(Error::MalformedIndex(_))
    ));
    assert!(matches!(XbwtIndex::from_bytes(&[], &config), Err(Error::MalformedIndex(_))));

    let mut longer = image.clone();
    longer.extend_from_slice(&[0, 0, 0, 0]);
    assert!(matches!(XbwtIndex::from_bytes(&longer, &config), Err(Error::MalformedIndex(_))));

    // node count in the header no longer matches the Last blocks
    let mut recounted = image;
    recounted[7] ^= 1;
    assert!(matches!(XbwtIndex::from_bytes(&recounted, &config), Err(Error::MalformedIndex(_))));
}

#[test]
fn compact_containers_restore_documents() {
    for layout in [Layout::Separate, Layout::Fused] {
        for codec in [CodecKind::Zstd, CodecKind::Snappy, CodecKind::Raw] {
            let config = IndexConfig {
                codec,
                ..IndexConfig::default()
            };
            for doc in DOCUMENTS {
                let packed = compress_document(doc.as_bytes(), &config, layout).unwrap();
                let xml = decompress_document(&packed, &config).unwrap();
                assert_eq!(String::from_utf8(xml).unwrap(), doc, "{} {}", layout, codec);
            }
            for seed in 100..110 {
                let doc = random_document(seed, 60);
                let packed = compress_document(doc.as_bytes(), &config, layout).unwrap();
                assert_eq!(decompress_document(&packed, &config).unwrap(), doc.into_bytes());
            }
        }
    }
}

#[test]
fn quotes_inside_attribute_values_survive() {
    let doc = "<r x='1\"2' y=\"it's\"><a k='say \"hi\"'>t</a></r>";
    let index = XbwtIndex::from_xml(doc.as_bytes(), &IndexConfig::default()).unwrap();
    assert_eq!(String::from_utf8(index.extract_document().unwrap()).unwrap(), doc);
    let mut nav = index.navigator();
    let row = (0..index.len())
        .find(|&r| nav.text_content(r).unwrap().as_deref() == Some(b"t"))
        .unwrap();
    let subtree = nav.subtree_text(row).unwrap();
    assert_eq!(subtree.text, b"<a k='say \"hi\"'>t</a>".to_vec());
}
