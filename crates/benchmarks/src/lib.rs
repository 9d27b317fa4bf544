//! Benchmarks for the NERDm record editor
//!
//! Shared fixtures for the criterion benches under `benches/`.

use ned_core::{Ediid, NerdRecord};
use serde_json::{json, Map, Value};

/// Re-export crates for benchmarks
pub use ned_core;
pub use ned_editor;
pub use ned_merge;
pub use ned_source;
pub use ned_storage;

/// A NERDm-shaped record with `components` file entries
pub fn sample_record(components: usize) -> NerdRecord {
    let files: Vec<Value> = (0..components)
        .map(|i| {
            json!({
                "@id": format!("cmps/data/file-{i}.csv"),
                "@type": ["nrdp:DataFile", "nrdp:DownloadableFile"],
                "filepath": format!("data/file-{i}.csv"),
                "mediaType": "text/csv",
                "size": 1024 * (i + 1),
            })
        })
        .collect();

    let value = json!({
        "@id": "ark:/88434/mds2-2106",
        "ediid": "mds2-2106",
        "title": "Calibration Data for Optical Frequency Standards",
        "description": ["Measurements collected during the 2019 calibration campaign."],
        "keyword": ["calibration", "metrology", "optics"],
        "contactPoint": {"fn": "Jane Doe", "hasEmail": "mailto:jane@nist.gov"},
        "publisher": {"@type": "org:Organization", "name": "National Institute of Standards and Technology"},
        "components": files,
        "version": "1.0.0",
    });

    // The literal above is always an object
    NerdRecord::from_value(value).unwrap_or_default()
}

/// A patch touching `fields` top-level fields plus one nested field
pub fn sample_patch(fields: usize) -> NerdRecord {
    let mut map = Map::new();
    for i in 0..fields {
        map.insert(format!("field{i}"), json!(format!("value {i}")));
    }
    map.insert("title".to_string(), json!("New Title Update Test May 14"));
    map.insert("contactPoint".to_string(), json!({"fn": "John Doe"}));
    NerdRecord::from_map(map)
}

/// `count` distinct ediids
pub fn sample_ids(count: usize) -> Vec<Ediid> {
    (0..count)
        .filter_map(|i| Ediid::new(format!("mds2-{i:04}")).ok())
        .collect()
}
