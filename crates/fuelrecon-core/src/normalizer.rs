//! # Reading Normalizer
//!
//! Turns the two inbound payload shapes into one [`ReadingCandidate`].
//!
//! ## Inbound Shapes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Manual entry form                  OCR pipeline output                 │
//! │  ─────────────────                  ───────────────────                 │
//! │  nozzleId                           pumpSerial + nozzleNumber           │
//! │  cumulativeVolume                   cumulativeVolume (text)             │
//! │  readingDate / readingTime          date? / time?  (free text)          │
//! │  paymentBreakdown?                  sourceUploadId                      │
//! │        │                                   │                            │
//! │        └─────────────┬─────────────────────┘                            │
//! │                      ▼                                                  │
//! │              ReadingCandidate                                           │
//! │   nozzle ref · cumulative Volume · reading_at · source · actor          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! No business rule runs here. Missing date or time falls back to the
//! receipt timestamp field by field; a missing nozzle identity or volume is
//! [`CoreError::MalformedCandidate`].

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreResult, ValidationError};
use crate::types::{Actor, PaymentBreakdown, ReadingSource};
use crate::volume::Volume;

/// Date layouts seen on pump receipts.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y"];

/// Time layouts seen on pump receipts.
const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M"];

// =============================================================================
// Candidate
// =============================================================================

/// How a candidate identifies its nozzle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NozzleRef {
    /// Direct nozzle id (manual entry).
    Id(String),
    /// Pump serial and nozzle position as printed on a receipt (OCR).
    PumpSlot {
        pump_serial: String,
        nozzle_number: i64,
    },
}

impl std::fmt::Display for NozzleRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NozzleRef::Id(id) => write!(f, "{}", id),
            NozzleRef::PumpSlot {
                pump_serial,
                nozzle_number,
            } => write!(f, "{}#{}", pump_serial, nozzle_number),
        }
    }
}

/// Canonical reading awaiting validation. Never persisted as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadingCandidate {
    pub nozzle: NozzleRef,
    pub cumulative: Volume,
    pub reading_at: DateTime<Utc>,
    pub source: ReadingSource,
    pub source_upload_id: Option<String>,
    pub submitted_by: Actor,
    pub payments: Option<PaymentBreakdown>,
}

impl ReadingCandidate {
    /// Calendar date used for duplicate detection.
    #[inline]
    pub fn reading_date(&self) -> NaiveDate {
        self.reading_at.date_naive()
    }
}

// =============================================================================
// Inbound Payloads
// =============================================================================

/// Manual entry payload from the attendant form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualReadingInput {
    pub nozzle_id: Option<String>,
    /// Meter value in litres as typed (`"1050.00"`).
    pub cumulative_volume: Option<String>,
    pub reading_date: Option<NaiveDate>,
    pub reading_time: Option<NaiveTime>,
    pub payment_breakdown: Option<PaymentBreakdown>,
    pub submitted_by: Actor,
}

/// Fields the OCR pipeline extracted from a receipt photo.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrReadingInput {
    pub pump_serial: Option<String>,
    pub nozzle_number: Option<String>,
    pub cumulative_volume: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub source_upload_id: String,
}

/// Who uploaded a receipt and when it arrived.
#[derive(Debug, Clone)]
pub struct UploadContext {
    pub uploaded_by: Actor,
    pub received_at: DateTime<Utc>,
}

// =============================================================================
// Normalizer
// =============================================================================

/// Shape normalization for manual and OCR payloads.
pub struct ReadingNormalizer;

impl ReadingNormalizer {
    /// Normalizes a manual entry. `received_at` backs a missing date or time.
    pub fn normalize_manual(
        input: &ManualReadingInput,
        received_at: DateTime<Utc>,
    ) -> CoreResult<ReadingCandidate> {
        let nozzle_id = non_blank(input.nozzle_id.as_deref())
            .ok_or_else(|| ValidationError::required("nozzle_id"))?;
        let cumulative = parse_volume(input.cumulative_volume.as_deref())?;

        let date = input.reading_date.unwrap_or_else(|| received_at.date_naive());
        let time = input.reading_time.unwrap_or_else(|| received_at.time());

        Ok(ReadingCandidate {
            nozzle: NozzleRef::Id(nozzle_id.to_string()),
            cumulative,
            reading_at: NaiveDateTime::new(date, time).and_utc(),
            source: ReadingSource::Manual,
            source_upload_id: None,
            submitted_by: input.submitted_by.clone(),
            payments: input.payment_breakdown,
        })
    }

    /// Normalizes OCR output. Missing date/time come from the upload.
    ///
    /// ## Example
    /// ```rust
    /// use chrono::{TimeZone, Utc};
    /// use fuelrecon_core::normalizer::{OcrReadingInput, ReadingNormalizer, UploadContext};
    /// use fuelrecon_core::{Actor, Role};
    ///
    /// let input = OcrReadingInput {
    ///     pump_serial: Some("MPD-0042".into()),
    ///     nozzle_number: Some("02".into()),
    ///     cumulative_volume: Some("001050.25".into()),
    ///     date: None,
    ///     time: Some("14:05".into()),
    ///     source_upload_id: "upl-1".into(),
    /// };
    /// let upload = UploadContext {
    ///     uploaded_by: Actor::new("u-1", Role::Attendant),
    ///     received_at: Utc.with_ymd_and_hms(2026, 3, 1, 18, 30, 0).unwrap(),
    /// };
    ///
    /// let candidate = ReadingNormalizer::normalize_ocr(&input, &upload).unwrap();
    /// assert_eq!(candidate.reading_at, Utc.with_ymd_and_hms(2026, 3, 1, 14, 5, 0).unwrap());
    /// assert_eq!(candidate.cumulative.ml(), 1_050_250);
    /// ```
    pub fn normalize_ocr(
        input: &OcrReadingInput,
        upload: &UploadContext,
    ) -> CoreResult<ReadingCandidate> {
        let pump_serial = non_blank(input.pump_serial.as_deref())
            .ok_or_else(|| ValidationError::required("pump_serial"))?;
        let nozzle_number = parse_nozzle_number(input.nozzle_number.as_deref())?;
        let cumulative = parse_volume(input.cumulative_volume.as_deref())?;

        let date = match non_blank(input.date.as_deref()) {
            Some(text) => parse_date(text)?,
            None => upload.received_at.date_naive(),
        };
        let time = match non_blank(input.time.as_deref()) {
            Some(text) => parse_time(text)?,
            None => upload.received_at.time(),
        };

        Ok(ReadingCandidate {
            nozzle: NozzleRef::PumpSlot {
                pump_serial: pump_serial.to_string(),
                nozzle_number,
            },
            cumulative,
            reading_at: NaiveDateTime::new(date, time).and_utc(),
            source: ReadingSource::Ocr,
            source_upload_id: Some(input.source_upload_id.clone()),
            submitted_by: upload.uploaded_by.clone(),
            payments: None,
        })
    }
}

// =============================================================================
// Field Parsers
// =============================================================================

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_volume(value: Option<&str>) -> Result<Volume, ValidationError> {
    let text = non_blank(value).ok_or_else(|| ValidationError::required("cumulative_volume"))?;
    let volume = Volume::parse_litres(text)?;
    if volume.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: "cumulative_volume".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(volume)
}

fn parse_nozzle_number(value: Option<&str>) -> Result<i64, ValidationError> {
    let text = non_blank(value).ok_or_else(|| ValidationError::required("nozzle_number"))?;
    let number: i64 = text
        .parse()
        .map_err(|_| ValidationError::invalid_format("nozzle_number", "must be a whole number"))?;
    if number <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "nozzle_number".to_string(),
        });
    }
    Ok(number)
}

fn parse_date(text: &str) -> Result<NaiveDate, ValidationError> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .ok_or_else(|| ValidationError::invalid_format("date", format!("unrecognised date '{}'", text)))
}

fn parse_time(text: &str) -> Result<NaiveTime, ValidationError> {
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(text, fmt).ok())
        .ok_or_else(|| ValidationError::invalid_format("time", format!("unrecognised time '{}'", text)))
}

// =============================================================================
// Unit Tests
// =============================================================================
