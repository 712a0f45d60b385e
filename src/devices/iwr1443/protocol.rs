//! IWR1443 telemetry wire format
//!
//! Frame layout (all multi-byte fields little-endian):
//! - Magic (8 bytes): `02 01 04 03 06 05 08 07`
//! - Frame header fields (7 x u32): version, packetLength (total frame
//!   bytes, magic inclusive), platform, frameNumber, time,
//!   detectedObjectCount, tlvCount
//! - `tlvCount` TLV records, each `{type: u32, length: u32}` followed by
//!   `length` payload bytes
//!
//! Payload element layouts are tightly packed with no padding between
//! elements; trailing bytes short of a whole element are ignored, matching
//! the device's own integer-division sizing.

use crate::error::{Error, Result};
use serde::Serialize;

/// Frame start marker: 0x0102, 0x0304, 0x0506, 0x0708 as LE u16s.
pub const FRAME_MAGIC: [u8; 8] = [0x02, 0x01, 0x04, 0x03, 0x06, 0x05, 0x08, 0x07];

/// Magic plus seven u32 fields.
pub const FRAME_HEADER_SIZE: usize = 36;

/// Type and length, both u32.
pub const TLV_HEADER_SIZE: usize = 8;

#[inline]
pub(crate) fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

#[inline]
pub(crate) fn read_i16(bytes: &[u8], offset: usize) -> i16 {
    i16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

#[inline]
pub(crate) fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

#[inline]
pub(crate) fn read_f32(bytes: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// Decoded frame header. The magic prefix is validated during parsing and
/// not retained.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameHeader {
    pub version: u32,
    pub packet_length: u32,
    pub platform: u32,
    pub frame_number: u32,
    pub time: u32,
    pub detected_object_count: u32,
    pub tlv_count: u32,
}

impl FrameHeader {
    /// Parse a header from the start of `frame`.
    pub fn parse(frame: &[u8]) -> Result<Self> {
        if frame.len() < FRAME_HEADER_SIZE {
            return Err(Error::InvalidFrame(format!(
                "{} bytes is too short for a frame header",
                frame.len()
            )));
        }
        if frame[..FRAME_MAGIC.len()] != FRAME_MAGIC {
            return Err(Error::InvalidFrame("missing magic prefix".to_string()));
        }

        Ok(FrameHeader {
            version: read_u32(frame, 8),
            packet_length: read_u32(frame, 12),
            platform: read_u32(frame, 16),
            frame_number: read_u32(frame, 20),
            time: read_u32(frame, 24),
            detected_object_count: read_u32(frame, 28),
            tlv_count: read_u32(frame, 32),
        })
    }
}

/// TLV record types emitted by the radar firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlvType {
    DetectedPoints,
    RangeProfile,
    NoiseFloorProfile,
    AzimuthStaticHeatmap,
    RangeDopplerHeatmap,
    Statistics,
    DetectedPointsSideInfo,
    AzimuthElevationStaticHeatmap,
    TemperatureStatistics,
    SphericalCoordinates,
    TargetList,
    TargetIndex,
    SphericalCompressedPointCloud,
    PresenceDetection,
    OccupancyStateMachineOutput,
}

impl TlvType {
    /// Parse a TLV type code. Unknown codes return `None`; they are
    /// tolerated by the decoder, not rejected.
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(TlvType::DetectedPoints),
            2 => Some(TlvType::RangeProfile),
            3 => Some(TlvType::NoiseFloorProfile),
            4 => Some(TlvType::AzimuthStaticHeatmap),
            5 => Some(TlvType::RangeDopplerHeatmap),
            6 => Some(TlvType::Statistics),
            7 => Some(TlvType::DetectedPointsSideInfo),
            8 => Some(TlvType::AzimuthElevationStaticHeatmap),
            9 => Some(TlvType::TemperatureStatistics),
            1000 => Some(TlvType::SphericalCoordinates),
            1010 => Some(TlvType::TargetList),
            1011 => Some(TlvType::TargetIndex),
            1020 => Some(TlvType::SphericalCompressedPointCloud),
            1021 => Some(TlvType::PresenceDetection),
            1030 => Some(TlvType::OccupancyStateMachineOutput),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TlvType::DetectedPoints => "DetectedPoints",
            TlvType::RangeProfile => "RangeProfile",
            TlvType::NoiseFloorProfile => "NoiseFloorProfile",
            TlvType::AzimuthStaticHeatmap => "AzimuthStaticHeatmap",
            TlvType::RangeDopplerHeatmap => "RangeDopplerHeatmap",
            TlvType::Statistics => "Statistics",
            TlvType::DetectedPointsSideInfo => "DetectedPointsSideInfo",
            TlvType::AzimuthElevationStaticHeatmap => "AzimuthElevationStaticHeatmap",
            TlvType::TemperatureStatistics => "TemperatureStatistics",
            TlvType::SphericalCoordinates => "SphericalCoordinates",
            TlvType::TargetList => "TargetList",
            TlvType::TargetIndex => "TargetIndex",
            TlvType::SphericalCompressedPointCloud => "SphericalCompressedPointCloud",
            TlvType::PresenceDetection => "PresenceDetection",
            TlvType::OccupancyStateMachineOutput => "OccupancyStateMachineOutput",
        }
    }
}

/// One detected reflector in Cartesian radar coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedPoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub doppler: f32,
}

impl DetectedPoint {
    pub const SIZE: usize = 16;
}

/// Decode a Q9.5 fixed-point value: bit 0 sign, bits 1-9 integer
/// magnitude, bits 10-14 fractional magnitude in 1/32 steps, bit 15
/// unused.
pub fn q9_to_f32(raw: u16) -> f32 {
    let integer = (raw >> 1) & 0x1FF;
    let fraction = (raw >> 10) & 0x1F;
    let magnitude = integer as f32 + fraction as f32 / 32.0;
    if raw & 1 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Frame processing timing counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub inter_frame_processing_time: u32,
    pub transmit_output_time: u32,
    pub inter_frame_processing_margin: u32,
    pub inter_chirp_processing_margin: u32,
    #[serde(rename = "activeFrameCPULoad")]
    pub active_frame_cpu_load: u32,
    #[serde(rename = "interFrameCPULoad")]
    pub inter_frame_cpu_load: u32,
}

impl Statistics {
    pub const SIZE: usize = 24;

    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() < Self::SIZE {
            return Err(Error::InvalidFrame(format!(
                "Statistics payload is {} bytes, need {}",
                payload.len(),
                Self::SIZE
            )));
        }
        Ok(Statistics {
            inter_frame_processing_time: read_u32(payload, 0),
            transmit_output_time: read_u32(payload, 4),
            inter_frame_processing_margin: read_u32(payload, 8),
            inter_chirp_processing_margin: read_u32(payload, 12),
            active_frame_cpu_load: read_u32(payload, 16),
            inter_frame_cpu_load: read_u32(payload, 20),
        })
    }
}

/// Per-point SNR and noise floor readings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedPointSideInfo {
    pub snr: u16,
    pub noise: u16,
}

impl DetectedPointSideInfo {
    pub const SIZE: usize = 4;
}

/// On-chip temperature sensor report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemperatureStatistics {
    pub temp_report_valid: u32,
    pub time: u32,
    pub tmp_rx0_sens: u16,
    pub tmp_rx1_sens: u16,
    pub tmp_rx2_sens: u16,
    pub tmp_rx3_sens: u16,
    pub tmp_tx0_sens: u16,
    pub tmp_tx1_sens: u16,
    pub tmp_tx2_sens: u16,
    pub tmp_pm_sens: u16,
    pub tmp_dig0_sens: u16,
    pub tmp_dig1_sens: u16,
}

impl TemperatureStatistics {
    pub const SIZE: usize = 28;

    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() < Self::SIZE {
            return Err(Error::InvalidFrame(format!(
                "TemperatureStatistics payload is {} bytes, need {}",
                payload.len(),
                Self::SIZE
            )));
        }
        Ok(TemperatureStatistics {
            temp_report_valid: read_u32(payload, 0),
            time: read_u32(payload, 4),
            tmp_rx0_sens: read_u16(payload, 8),
            tmp_rx1_sens: read_u16(payload, 10),
            tmp_rx2_sens: read_u16(payload, 12),
            tmp_rx3_sens: read_u16(payload, 14),
            tmp_tx0_sens: read_u16(payload, 16),
            tmp_tx1_sens: read_u16(payload, 18),
            tmp_tx2_sens: read_u16(payload, 20),
            tmp_pm_sens: read_u16(payload, 22),
            tmp_dig0_sens: read_u16(payload, 24),
            tmp_dig1_sens: read_u16(payload, 26),
        })
    }
}

/// One detected reflector in spherical radar coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SphericalCoordinate {
    /// meters
    pub range: f32,
    /// radians
    pub azimuth: f32,
    /// radians
    pub elevation: f32,
    /// meters/second
    pub doppler: f32,
}

impl SphericalCoordinate {
    pub const SIZE: usize = 16;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    fn parse(payload: &[u8], offset: usize) -> Self {
        Vec3 {
            x: read_f32(payload, offset),
            y: read_f32(payload, offset + 4),
            z: read_f32(payload, offset + 8),
        }
    }
}

/// One track from the group tracker: kinematic state plus the tracker's
/// 3x3 error covariance, 21 floats in total.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tracked3DTarget {
    #[serde(rename = "trackID")]
    pub track_id: f32,
    pub position: Vec3,
    pub velocity: Vec3,
    pub acceleration: Vec3,
    pub error_covariance: [[f32; 3]; 3],
    pub gating_function_gain: f32,
    pub confidence_level: f32,
}

impl Tracked3DTarget {
    pub const SIZE: usize = 84;

    fn parse(record: &[u8]) -> Self {
        let mut error_covariance = [[0.0f32; 3]; 3];
        for (row, values) in error_covariance.iter_mut().enumerate() {
            for (col, value) in values.iter_mut().enumerate() {
                *value = read_f32(record, 40 + (row * 3 + col) * 4);
            }
        }

        Tracked3DTarget {
            track_id: read_f32(record, 0),
            position: Vec3::parse(record, 4),
            velocity: Vec3::parse(record, 16),
            acceleration: Vec3::parse(record, 28),
            error_covariance,
            gating_function_gain: read_f32(record, 76),
            confidence_level: read_f32(record, 80),
        }
    }
}

/// Decompression units for a compressed point cloud.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SphericalCompressedPointCloudHeader {
    pub elevation_unit: f32,
    pub azimuth_unit: f32,
    pub doppler_unit: f32,
    pub range_unit: f32,
    pub snr_unit: f32,
}

impl SphericalCompressedPointCloudHeader {
    pub const SIZE: usize = 20;

    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() < Self::SIZE {
            return Err(Error::InvalidFrame(format!(
                "compressed point cloud header is {} bytes, need {}",
                payload.len(),
                Self::SIZE
            )));
        }
        Ok(SphericalCompressedPointCloudHeader {
            elevation_unit: read_f32(payload, 0),
            azimuth_unit: read_f32(payload, 4),
            doppler_unit: read_f32(payload, 8),
            range_unit: read_f32(payload, 12),
            snr_unit: read_f32(payload, 16),
        })
    }
}

/// One quantized point; multiply by the header units to decompress.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SphericalCompressedPoint {
    pub elevation: i8,
    pub azimuth: i8,
    pub doppler: i16,
    pub range: u16,
    pub snr: u16,
}

impl SphericalCompressedPoint {
    pub const SIZE: usize = 8;
}

/// Parse a tightly packed array payload, ignoring any trailing bytes
/// short of a whole element.
pub fn parse_detected_points(payload: &[u8]) -> Vec<DetectedPoint> {
    payload
        .chunks_exact(DetectedPoint::SIZE)
        .map(|chunk| DetectedPoint {
            x: read_f32(chunk, 0),
            y: read_f32(chunk, 4),
            z: read_f32(chunk, 8),
            doppler: read_f32(chunk, 12),
        })
        .collect()
}

pub fn parse_range_profile(payload: &[u8]) -> Vec<f32> {
    payload
        .chunks_exact(2)
        .map(|chunk| q9_to_f32(read_u16(chunk, 0)))
        .collect()
}

pub fn parse_side_info(payload: &[u8]) -> Vec<DetectedPointSideInfo> {
    payload
        .chunks_exact(DetectedPointSideInfo::SIZE)
        .map(|chunk| DetectedPointSideInfo {
            snr: read_u16(chunk, 0),
            noise: read_u16(chunk, 2),
        })
        .collect()
}

pub fn parse_spherical_coordinates(payload: &[u8]) -> Vec<SphericalCoordinate> {
    payload
        .chunks_exact(SphericalCoordinate::SIZE)
        .map(|chunk| SphericalCoordinate {
            range: read_f32(chunk, 0),
            azimuth: read_f32(chunk, 4),
            elevation: read_f32(chunk, 8),
            doppler: read_f32(chunk, 12),
        })
        .collect()
}

pub fn parse_target_list(payload: &[u8]) -> Vec<Tracked3DTarget> {
    payload
        .chunks_exact(Tracked3DTarget::SIZE)
        .map(Tracked3DTarget::parse)
        .collect()
}

pub fn parse_compressed_points(payload: &[u8]) -> Vec<SphericalCompressedPoint> {
    payload
        .chunks_exact(SphericalCompressedPoint::SIZE)
        .map(|chunk| SphericalCompressedPoint {
            elevation: chunk[0] as i8,
            azimuth: chunk[1] as i8,
            doppler: read_i16(chunk, 2),
            range: read_u16(chunk, 4),
            snr: read_u16(chunk, 6),
        })
        .collect()
}
