use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::engine::{JoinRequest, NewBooking};
use crate::model::{CourtId, MatchSize};
use crate::timefmt::parse_time;

use super::error::ApiError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

/// `{"success": true, "data": ...}` or `{"success": false, "error": {...}}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(code: &'static str, message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ErrorBody { code, message }),
        }
    }
}

fn time_field(name: &str, value: &str) -> Result<NaiveTime, ApiError> {
    parse_time(value).map_err(|e| ApiError::BadRequest(format!("{name}: {e}")))
}

#[derive(Debug, Deserialize)]
pub struct CreateBookingBody {
    pub court_id: CourtId,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub match_size: MatchSize,
    pub team_name: String,
    pub contact_phone: String,
    pub player_count: u8,
    #[serde(default)]
    pub matchmaking: bool,
}

impl CreateBookingBody {
    pub fn into_request(self) -> Result<NewBooking, ApiError> {
        Ok(NewBooking {
            court_id: self.court_id,
            date: self.date,
            start: time_field("start_time", &self.start_time)?,
            end: time_field("end_time", &self.end_time)?,
            match_size: self.match_size,
            team_name: self.team_name,
            contact_phone: self.contact_phone,
            player_count: self.player_count,
            matchmaking: self.matchmaking,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct JoinBody {
    pub court_id: CourtId,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub match_size: MatchSize,
    pub team_name: String,
    pub contact_phone: String,
    pub player_count: u8,
}

impl JoinBody {
    pub fn into_request(self) -> Result<JoinRequest, ApiError> {
        Ok(JoinRequest {
            court_id: self.court_id,
            date: self.date,
            start: time_field("start_time", &self.start_time)?,
            end: time_field("end_time", &self.end_time)?,
            match_size: self.match_size,
            team_name: self.team_name,
            contact_phone: self.contact_phone,
            player_count: self.player_count,
        })
    }
}

/// One price entry. Prices travel as decimal strings, e.g. `"800"`.
#[derive(Debug, Deserialize)]
pub struct PriceBody {
    pub start_time: String,
    pub end_time: String,
    pub match_size: MatchSize,
    pub price: Decimal,
}

impl PriceBody {
    pub fn times(&self) -> Result<(NaiveTime, NaiveTime), ApiError> {
        Ok((
            time_field("start_time", &self.start_time)?,
            time_field("end_time", &self.end_time)?,
        ))
    }
}

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct CourtBookingsQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub court_id: Option<CourtId>,
}

#[derive(Debug, Serialize)]
pub struct PricesUpdated {
    pub court_id: CourtId,
    pub entries: usize,
}
