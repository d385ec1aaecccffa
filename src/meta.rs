//! Group- and array-level metadata documents in the v2 and v3 dialects.
//!
//! Everything here is pure: builders return `serde_json::Value` and the
//! stream/writers decide which sink the rendered text lands in. All JSON is
//! rendered with a 4-space indent.

use serde::Serialize;
use serde_json::{json, Value};

use crate::array::dimension::ArrayDimensions;
use crate::codec::BloscParams;
use crate::settings::ZarrVersion;

/// Render with 4-space indentation, UTF-8, LF line endings.
pub(crate) fn to_json_text(value: &Value) -> String {
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut out = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    value
        .serialize(&mut ser)
        .expect("serializing an in-memory JSON value cannot fail");
    String::from_utf8(out).expect("serde_json emits UTF-8")
}

/// Zarr v2 group descriptor (`.zgroup`).
pub(crate) fn v2_group_metadata() -> Value {
    json!({ "zarr_format": 2 })
}

/// Zarr v2 group attributes (`.zattrs`) carrying the OME-NGFF 0.4
/// multiscales document.
pub(crate) fn v2_base_metadata(dims: &ArrayDimensions, n_levels: usize) -> Value {
    json!({ "multiscales": ome_multiscales(dims, n_levels, ZarrVersion::V2) })
}

/// Historical v3 base document written to `zarr.json` at construction and
/// later overwritten by the group document written to the same key.
pub(crate) fn v3_base_metadata() -> Value {
    json!({
        "extensions": [],
        "metadata_encoding": "https://purl.org/zarr/spec/protocol/core/3.0",
        "metadata_key_suffix": ".json",
        "zarr_format": "https://purl.org/zarr/spec/protocol/core/3.0",
    })
}

/// Zarr v3 group descriptor (`zarr.json`) with OME 0.5 attributes.
pub(crate) fn v3_group_metadata(dims: &ArrayDimensions, n_levels: usize) -> Value {
    json!({
        "zarr_format": 3,
        "node_type": "group",
        "consolidated_metadata": null,
        "attributes": {
            "ome": {
                "version": "0.5",
                "name": "/",
                "multiscales": ome_multiscales(dims, n_levels, ZarrVersion::V3),
            },
        },
    })
}

/// OME multiscales array shared by both dialects. The v2 flavor carries
/// `version`/`name` inline; v3 hoists them onto the enclosing `ome` object.
fn ome_multiscales(dims: &ArrayDimensions, n_levels: usize, version: ZarrVersion) -> Value {
    let ndims = dims.ndims();

    let mut axes = Vec::with_capacity(ndims);
    for (i, dim) in dims.iter().enumerate() {
        if i < ndims - 2 {
            axes.push(json!({ "name": dim.name, "type": dim.kind.as_str() }));
        } else {
            // height and width carry physical units
            axes.push(json!({
                "name": dim.name,
                "type": dim.kind.as_str(),
                "unit": "micrometer",
            }));
        }
    }

    let mut datasets = vec![json!({
        "path": "0",
        "coordinateTransformations": [
            { "type": "scale", "scale": vec![1.0; ndims] },
        ],
    })];
    for level in 1..n_levels {
        let factor = f64::powi(2.0, level as i32);
        let mut scale = Vec::with_capacity(ndims);
        scale.push(factor); // append axis
        scale.extend(std::iter::repeat(1.0).take(ndims - 3));
        scale.push(factor); // y
        scale.push(factor); // x

        datasets.push(json!({
            "path": level.to_string(),
            "coordinateTransformations": [
                { "type": "scale", "scale": scale },
            ],
        }));
    }

    let mut multiscale = json!({ "axes": axes, "datasets": datasets });
    if n_levels > 1 {
        multiscale["type"] = json!("local_mean");
        multiscale["metadata"] = json!({
            "description": "The fields in the metadata describe how to reproduce this multiscaling in scikit-image. The method and its parameters are given here.",
            "method": "skimage.transform.downscale_local_mean",
            "version": "0.21.0",
            "args": "[2]",
            "kwargs": { "cval": 0 },
        });
    }
    if version == ZarrVersion::V2 {
        multiscale["version"] = json!("0.4");
        multiscale["name"] = json!("/");
    }

    json!([multiscale])
}

/// Zarr v2 array descriptor (`.zarray`).
pub(crate) fn v2_array_metadata(
    dims: &ArrayDimensions,
    append_extent: u64,
    compression: Option<&BloscParams>,
) -> Value {
    json!({
        "zarr_format": 2,
        "shape": shape(dims, append_extent),
        "chunks": dims.iter().map(|d| d.chunk_size_px).collect::<Vec<_>>(),
        "dtype": dims.dtype().zarr_v2_name(),
        "fill_value": 0,
        "order": "C",
        "filters": null,
        "dimension_separator": "/",
        "compressor": compression.map(BloscParams::v2_metadata).unwrap_or(Value::Null),
    })
}

/// Zarr v3 array descriptor (`zarr.json`) with the sharding codec chain.
pub(crate) fn v3_array_metadata(
    dims: &ArrayDimensions,
    append_extent: u64,
    compression: Option<&BloscParams>,
) -> Value {
    let chunk_shape: Vec<u64> = dims.iter().map(|d| d.chunk_size_px).collect();
    let shard_shape_px: Vec<u64> = dims
        .iter()
        .map(|d| d.chunk_size_px * d.shard_size_chunks)
        .collect();

    let mut chunk_codecs = vec![json!({
        "name": "bytes",
        "configuration": { "endian": "little" },
    })];
    if let Some(params) = compression {
        chunk_codecs.push(params.v3_metadata());
    }

    json!({
        "zarr_format": 3,
        "node_type": "array",
        "shape": shape(dims, append_extent),
        "data_type": dims.dtype().zarr_v3_name(),
        "chunk_grid": {
            "name": "regular",
            "configuration": { "chunk_shape": shard_shape_px },
        },
        "chunk_key_encoding": {
            "name": "default",
            "configuration": { "separator": "/" },
        },
        "fill_value": 0,
        "codecs": [{
            "name": "sharding_indexed",
            "configuration": {
                "chunk_shape": chunk_shape,
                "codecs": chunk_codecs,
                "index_codecs": [{
                    "name": "bytes",
                    "configuration": { "endian": "little" },
                }],
                "index_location": "end",
            },
        }],
        "dimension_names": dims.iter().map(|d| d.name.clone()).collect::<Vec<_>>(),
    })
}

/// Array shape with the append extent replaced by the number of frames
/// actually written.
fn shape(dims: &ArrayDimensions, append_extent: u64) -> Vec<u64> {
    let mut out: Vec<u64> = dims.iter().map(|d| d.array_size_px).collect();
    out[0] = append_extent;
    out
}
