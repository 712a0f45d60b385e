//! Frame-to-JSON decoding
//!
//! Takes one complete frame (magic through last TLV) and renders a single
//! JSON record:
//!
//! ```json
//! {"Header": {"version": 3, "packetLength": 68, ...},
//!  "TLVs": [{"Type": "Statistics", "Data": {...}}, ...]}
//! ```
//!
//! Records are emitted newline-delimited (NDJSON), one per frame. Unknown
//! TLV types are kept in the record by name with no `Data` field and
//! traversal continues past them by their declared length. A declared
//! length that runs past the end of the frame is fatal for the whole
//! frame.

use super::protocol::{
    parse_compressed_points, parse_detected_points, parse_range_profile, parse_side_info,
    parse_spherical_coordinates, parse_target_list, read_u32, FrameHeader, Statistics,
    SphericalCompressedPoint, SphericalCompressedPointCloudHeader, TemperatureStatistics, TlvType,
    FRAME_HEADER_SIZE, TLV_HEADER_SIZE,
};
use crate::error::{Error, Result};
use serde::Serialize;

/// A decoded frame ready for JSON rendering.
#[derive(Debug, Serialize)]
pub struct FrameRecord {
    #[serde(rename = "Header")]
    pub header: FrameHeader,
    #[serde(rename = "TLVs")]
    pub tlvs: Vec<TlvRecord>,
}

/// One TLV entry of a frame record. `data` is absent for TLV types whose
/// payload is not decoded.
#[derive(Debug, Serialize)]
pub struct TlvRecord {
    #[serde(rename = "Type")]
    pub kind: &'static str,
    #[serde(rename = "Data", skip_serializing_if = "Option::is_none")]
    pub data: Option<TlvData>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum TlvData {
    DetectedPoints(Vec<super::protocol::DetectedPoint>),
    RangeProfile(Vec<f32>),
    Statistics(Statistics),
    SideInfo(Vec<super::protocol::DetectedPointSideInfo>),
    Temperature(TemperatureStatistics),
    Spherical(Vec<super::protocol::SphericalCoordinate>),
    Targets(Vec<super::protocol::Tracked3DTarget>),
    TargetIndex(Vec<u8>),
    CompressedCloud(CompressedPointCloud),
}

/// Decompression header plus quantized points.
#[derive(Debug, Serialize)]
pub struct CompressedPointCloud {
    #[serde(rename = "Header")]
    pub header: SphericalCompressedPointCloudHeader,
    #[serde(rename = "Points")]
    pub points: Vec<SphericalCompressedPoint>,
}

/// Decode a complete frame into its record form.
pub fn decode_frame(frame: &[u8]) -> Result<FrameRecord> {
    let header = FrameHeader::parse(frame)?;

    let mut offset = FRAME_HEADER_SIZE;
    let mut tlvs = Vec::with_capacity(header.tlv_count as usize);

    for index in 0..header.tlv_count {
        if offset + TLV_HEADER_SIZE > frame.len() {
            return Err(Error::InvalidFrame(format!(
                "TLV {} header at offset {} overruns {}-byte frame",
                index,
                offset,
                frame.len()
            )));
        }

        let type_code = read_u32(frame, offset);
        let length = read_u32(frame, offset + 4) as usize;
        let payload_start = offset + TLV_HEADER_SIZE;

        if length > frame.len() - payload_start {
            return Err(Error::InvalidFrame(format!(
                "TLV {} declares {} payload bytes, only {} remain",
                index,
                length,
                frame.len() - payload_start
            )));
        }

        let payload = &frame[payload_start..payload_start + length];
        tlvs.push(decode_tlv(type_code, payload)?);

        offset = payload_start + length;
    }

    Ok(FrameRecord { header, tlvs })
}

/// Decode one frame and render it as an NDJSON line.
pub fn render_frame(frame: &[u8]) -> Result<String> {
    let record = decode_frame(frame)?;
    let mut json = serde_json::to_string(&record)?;
    json.push('\n');
    Ok(json)
}

fn decode_tlv(type_code: u32, payload: &[u8]) -> Result<TlvRecord> {
    let Some(tlv_type) = TlvType::from_u32(type_code) else {
        log::debug!(
            "Unknown TLV type {} ({} payload bytes), keeping record without data",
            type_code,
            payload.len()
        );
        return Ok(TlvRecord {
            kind: "Unknown",
            data: None,
        });
    };

    let data = match tlv_type {
        TlvType::DetectedPoints => Some(TlvData::DetectedPoints(parse_detected_points(payload))),
        TlvType::RangeProfile => Some(TlvData::RangeProfile(parse_range_profile(payload))),
        TlvType::Statistics => Some(TlvData::Statistics(Statistics::parse(payload)?)),
        TlvType::DetectedPointsSideInfo => Some(TlvData::SideInfo(parse_side_info(payload))),
        TlvType::TemperatureStatistics => {
            Some(TlvData::Temperature(TemperatureStatistics::parse(payload)?))
        }
        TlvType::SphericalCoordinates => {
            Some(TlvData::Spherical(parse_spherical_coordinates(payload)))
        }
        TlvType::TargetList => Some(TlvData::Targets(parse_target_list(payload))),
        TlvType::TargetIndex => Some(TlvData::TargetIndex(payload.to_vec())),
        TlvType::SphericalCompressedPointCloud => {
            let header = SphericalCompressedPointCloudHeader::parse(payload)?;
            let points =
                parse_compressed_points(&payload[SphericalCompressedPointCloudHeader::SIZE..]);
            Some(TlvData::CompressedCloud(CompressedPointCloud {
                header,
                points,
            }))
        }
        // Recognized by name only; the payload layout is not decoded.
        TlvType::NoiseFloorProfile
        | TlvType::AzimuthStaticHeatmap
        | TlvType::RangeDopplerHeatmap
        | TlvType::AzimuthElevationStaticHeatmap
        | TlvType::PresenceDetection
        | TlvType::OccupancyStateMachineOutput => None,
    };

    Ok(TlvRecord {
        kind: tlv_type.name(),
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::iwr1443::protocol::FRAME_MAGIC;
    use serde_json::Value;

    /// Frame builder: header fields plus (type, payload) TLVs with the
    /// packet length computed from the actual content.
    pub(crate) fn build_frame(frame_number: u32, tlvs: &[(u32, Vec<u8>)]) -> Vec<u8> {
        let tlv_bytes: usize = tlvs.iter().map(|(_, p)| TLV_HEADER_SIZE + p.len()).sum();
        let packet_length = (FRAME_HEADER_SIZE + tlv_bytes) as u32;

        let mut out = Vec::new();
        out.extend_from_slice(&FRAME_MAGIC);
        for value in [
            3u32,
            packet_length,
            0x16,
            frame_number,
            1000,
            0,
            tlvs.len() as u32,
        ] {
            out.extend_from_slice(&value.to_le_bytes());
        }
        for (type_code, payload) in tlvs {
            out.extend_from_slice(&type_code.to_le_bytes());
            out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            out.extend_from_slice(payload);
        }
        out
    }

    fn parse_json(frame: &[u8]) -> Value {
        let json = render_frame(frame).unwrap();
        assert!(json.ends_with('\n'));
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn test_statistics_frame() {
        let mut payload = Vec::new();
        for value in [10u32, 20, 30, 40, 50, 60] {
            payload.extend_from_slice(&value.to_le_bytes());
        }
        let frame = build_frame(1, &[(6, payload)]);

        let value = parse_json(&frame);
        assert_eq!(value["Header"]["version"], 3);
        assert_eq!(value["Header"]["frameNumber"], 1);
        assert_eq!(value["Header"]["time"], 1000);
        assert_eq!(value["Header"]["detectedObjectCount"], 0);
        assert_eq!(value["Header"]["tlvCount"], 1);

        let tlv = &value["TLVs"][0];
        assert_eq!(tlv["Type"], "Statistics");
        assert_eq!(tlv["Data"]["interFrameProcessingTime"], 10);
        assert_eq!(tlv["Data"]["transmitOutputTime"], 20);
        assert_eq!(tlv["Data"]["interFrameProcessingMargin"], 30);
        assert_eq!(tlv["Data"]["interChirpProcessingMargin"], 40);
        assert_eq!(tlv["Data"]["activeFrameCPULoad"], 50);
        assert_eq!(tlv["Data"]["interFrameCPULoad"], 60);
    }

    #[test]
    fn test_detected_points_frame() {
        let mut payload = Vec::new();
        for value in [1.0f32, 2.0, 3.0, 0.5, -1.0, -2.0, -3.0, -0.5] {
            payload.extend_from_slice(&value.to_le_bytes());
        }
        let frame = build_frame(2, &[(1, payload)]);

        let value = parse_json(&frame);
        let tlv = &value["TLVs"][0];
        assert_eq!(tlv["Type"], "DetectedPoints");

        let points = tlv["Data"].as_array().unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0]["x"].as_f64().unwrap(), 1.0);
        assert_eq!(points[0]["doppler"].as_f64().unwrap(), 0.5);
        assert_eq!(points[1]["x"].as_f64().unwrap(), -1.0);
        assert_eq!(points[1]["y"].as_f64().unwrap(), -2.0);
        assert_eq!(points[1]["z"].as_f64().unwrap(), -3.0);
        assert_eq!(points[1]["doppler"].as_f64().unwrap(), -0.5);
    }

    #[test]
    fn test_unknown_tlv_keeps_record_without_data() {
        let frame = build_frame(3, &[(9999, vec![1, 2, 3, 4])]);

        let value = parse_json(&frame);
        let tlv = &value["TLVs"][0];
        assert_eq!(tlv["Type"], "Unknown");
        assert!(tlv.get("Data").is_none());
    }

    #[test]
    fn test_named_but_undecoded_tlv() {
        let frame = build_frame(4, &[(5, vec![0xFF; 16])]);

        let value = parse_json(&frame);
        let tlv = &value["TLVs"][0];
        assert_eq!(tlv["Type"], "RangeDopplerHeatmap");
        assert!(tlv.get("Data").is_none());
    }

    #[test]
    fn test_tlv_records_emitted_in_order() {
        let mut stats = Vec::new();
        for value in [1u32, 2, 3, 4, 5, 6] {
            stats.extend_from_slice(&value.to_le_bytes());
        }
        let frame = build_frame(
            5,
            &[
                (1011, vec![0, 1, 2]),
                (6, stats),
                (9999, vec![0xAA]),
                (1011, vec![9]),
            ],
        );

        let value = parse_json(&frame);
        let kinds: Vec<&str> = value["TLVs"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["Type"].as_str().unwrap())
            .collect();
        assert_eq!(kinds, ["TargetIndex", "Statistics", "Unknown", "TargetIndex"]);
        assert_eq!(value["TLVs"][0]["Data"], serde_json::json!([0, 1, 2]));
        assert_eq!(value["TLVs"][3]["Data"], serde_json::json!([9]));
    }

    #[test]
    fn test_range_profile_q9_values() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&((3u16) << 1).to_le_bytes()); // +3.0
        payload.extend_from_slice(&(((2u16) << 1) | 1 | (16 << 10)).to_le_bytes()); // -2.5
        let frame = build_frame(6, &[(2, payload)]);

        let value = parse_json(&frame);
        let tlv = &value["TLVs"][0];
        assert_eq!(tlv["Type"], "RangeProfile");
        assert_eq!(tlv["Data"][0].as_f64().unwrap(), 3.0);
        assert_eq!(tlv["Data"][1].as_f64().unwrap(), -2.5);
    }

    #[test]
    fn test_side_info_frame() {
        let mut payload = Vec::new();
        for value in [100u16, 7, 200, 9] {
            payload.extend_from_slice(&value.to_le_bytes());
        }
        let frame = build_frame(7, &[(7, payload)]);

        let value = parse_json(&frame);
        let tlv = &value["TLVs"][0];
        assert_eq!(tlv["Type"], "DetectedPointsSideInfo");
        assert_eq!(tlv["Data"][0]["snr"], 100);
        assert_eq!(tlv["Data"][0]["noise"], 7);
        assert_eq!(tlv["Data"][1]["snr"], 200);
        assert_eq!(tlv["Data"][1]["noise"], 9);
    }

    #[test]
    fn test_compressed_point_cloud_frame() {
        let mut payload = Vec::new();
        for unit in [0.01f32, 0.02, 0.25, 0.05, 0.1] {
            payload.extend_from_slice(&unit.to_le_bytes());
        }
        payload.push(3i8 as u8);
        payload.push((-4i8) as u8);
        payload.extend_from_slice(&(-50i16).to_le_bytes());
        payload.extend_from_slice(&800u16.to_le_bytes());
        payload.extend_from_slice(&15u16.to_le_bytes());
        let frame = build_frame(8, &[(1020, payload)]);

        let value = parse_json(&frame);
        let tlv = &value["TLVs"][0];
        assert_eq!(tlv["Type"], "SphericalCompressedPointCloud");
        assert!((tlv["Data"]["Header"]["rangeUnit"].as_f64().unwrap() - 0.05).abs() < 1e-6);
        assert_eq!(tlv["Data"]["Points"][0]["elevation"], 3);
        assert_eq!(tlv["Data"]["Points"][0]["azimuth"], -4);
        assert_eq!(tlv["Data"]["Points"][0]["doppler"], -50);
        assert_eq!(tlv["Data"]["Points"][0]["range"], 800);
        assert_eq!(tlv["Data"]["Points"][0]["snr"], 15);
    }

    #[test]
    fn test_target_list_frame() {
        let mut payload = Vec::new();
        for value in 0..21 {
            payload.extend_from_slice(&(value as f32).to_le_bytes());
        }
        let frame = build_frame(9, &[(1010, payload)]);

        let value = parse_json(&frame);
        let tlv = &value["TLVs"][0];
        assert_eq!(tlv["Type"], "TargetList");
        let target = &tlv["Data"][0];
        assert_eq!(target["trackID"], 0.0);
        assert_eq!(target["position"]["x"], 1.0);
        assert_eq!(target["velocity"]["z"], 6.0);
        assert_eq!(target["errorCovariance"][1][1], 14.0);
        assert_eq!(target["gatingFunctionGain"], 19.0);
        assert_eq!(target["confidenceLevel"], 20.0);
    }

    #[test]
    fn test_temperature_frame() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&1u32.to_le_bytes());
        payload.extend_from_slice(&2000u32.to_le_bytes());
        for value in 0..10u16 {
            payload.extend_from_slice(&(350 + value).to_le_bytes());
        }
        let frame = build_frame(10, &[(9, payload)]);

        let value = parse_json(&frame);
        let tlv = &value["TLVs"][0];
        assert_eq!(tlv["Type"], "TemperatureStatistics");
        assert_eq!(tlv["Data"]["tempReportValid"], 1);
        assert_eq!(tlv["Data"]["tmpRx0Sens"], 350);
        assert_eq!(tlv["Data"]["tmpDig1Sens"], 359);
    }

    #[test]
    fn test_tlv_length_overrun_is_fatal() {
        // Declared TLV length runs past the end of the frame.
        let mut frame = build_frame(11, &[(6, vec![0u8; 24])]);
        let length_offset = FRAME_HEADER_SIZE + 4;
        frame[length_offset..length_offset + 4].copy_from_slice(&1000u32.to_le_bytes());

        assert!(decode_frame(&frame).is_err());
    }

    #[test]
    fn test_tlv_count_beyond_frame_is_fatal() {
        let mut frame = build_frame(12, &[(1011, vec![1, 2])]);
        // Claim two TLVs while only one is present.
        frame[32..36].copy_from_slice(&2u32.to_le_bytes());

        assert!(decode_frame(&frame).is_err());
    }

    #[test]
    fn test_empty_frame_renders() {
        let frame = build_frame(13, &[]);

        let value = parse_json(&frame);
        assert_eq!(value["Header"]["tlvCount"], 0);
        assert_eq!(value["TLVs"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_header_field_order_is_stable() {
        let frame = build_frame(14, &[]);
        let json = render_frame(&frame).unwrap();

        let version_at = json.find("\"version\"").unwrap();
        let packet_at = json.find("\"packetLength\"").unwrap();
        let tlv_count_at = json.find("\"tlvCount\"").unwrap();
        assert!(version_at < packet_at && packet_at < tlv_count_at);
    }
}
