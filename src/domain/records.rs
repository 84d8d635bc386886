//! Typed rows for each external source. Every source parses into one of these
//! before it is flattened into a [`RecordSet`], so shape mismatches surface as
//! [`EtlError::ParseError`] instead of silently missing columns.

use crate::domain::model::{Column, ColumnType, RecordSet, Schema, Value};
use crate::utils::error::{EtlError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub mod columns {
    pub const CUSTOMER_ID: &str = "Customer_ID";
    pub const CUSTOMER_NAME: &str = "Customer_Name";
    pub const AGE: &str = "Age";
    pub const GENDER: &str = "Gender";
    pub const PURCHASE_AMOUNT: &str = "Purchase_Amount";
    pub const PURCHASE_DATE: &str = "Purchase_Date";
    pub const FIRST_NAME: &str = "First_Name";
    pub const LAST_NAME: &str = "Last_Name";
}

/// One row of the local customer purchases file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    #[serde(rename = "Customer_ID")]
    pub customer_id: i64,
    #[serde(rename = "Customer_Name")]
    pub customer_name: Option<String>,
    #[serde(rename = "Age")]
    pub age: Option<i64>,
    #[serde(rename = "Gender")]
    pub gender: Option<String>,
    #[serde(rename = "Purchase_Amount")]
    pub purchase_amount: Option<f64>,
    #[serde(rename = "Purchase_Date")]
    pub purchase_date: Option<NaiveDate>,
}

impl Customer {
    pub fn schema() -> Schema {
        Schema::new(vec![
            Column::new(columns::CUSTOMER_ID, ColumnType::Integer),
            Column::new(columns::CUSTOMER_NAME, ColumnType::Text),
            Column::new(columns::AGE, ColumnType::Integer),
            Column::new(columns::GENDER, ColumnType::Text),
            Column::new(columns::PURCHASE_AMOUNT, ColumnType::Float),
            Column::new(columns::PURCHASE_DATE, ColumnType::Date),
        ])
    }

    pub fn into_row(self) -> Vec<Value> {
        vec![
            Value::Integer(self.customer_id),
            self.customer_name.into(),
            self.age.into(),
            self.gender.into(),
            self.purchase_amount.into(),
            self.purchase_date.into(),
        ]
    }

    pub fn to_record_set(customers: Vec<Customer>) -> RecordSet {
        RecordSet::new(
            Self::schema(),
            customers.into_iter().map(Customer::into_row).collect(),
        )
    }
}

/// CoinCap sends most numbers as strings, but not consistently.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Numeric {
    Number(serde_json::Number),
    Text(String),
}

impl Numeric {
    fn to_i64(&self, field: &str) -> Result<i64> {
        let parsed = match self {
            Numeric::Number(n) => n.as_i64(),
            Numeric::Text(s) => s.trim().parse().ok(),
        };
        parsed.ok_or_else(|| {
            EtlError::parse(EXCHANGES_SOURCE, format!("{} is not an integer: {:?}", field, self))
        })
    }

    fn to_f64(&self, field: &str) -> Result<f64> {
        let parsed = match self {
            Numeric::Number(n) => n.as_f64(),
            Numeric::Text(s) => s.trim().parse().ok(),
        };
        parsed.ok_or_else(|| {
            EtlError::parse(EXCHANGES_SOURCE, format!("{} is not a number: {:?}", field, self))
        })
    }
}

const EXCHANGES_SOURCE: &str = "exchanges";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExchangePayload {
    exchange_id: String,
    name: String,
    rank: Numeric,
    percent_total_volume: Option<Numeric>,
    volume_usd: Option<Numeric>,
    trading_pairs: Numeric,
    socket: Option<bool>,
    exchange_url: Option<String>,
    updated: Numeric,
}

#[derive(Debug, Clone, Deserialize)]
struct ExchangesEnvelope {
    data: Vec<ExchangePayload>,
    #[allow(dead_code)]
    timestamp: Option<i64>,
}

/// One exchange from the `/v3/exchanges` listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Exchange {
    pub exchange_id: String,
    pub name: String,
    pub rank: i64,
    pub percent_total_volume: Option<f64>,
    pub volume_usd: Option<f64>,
    pub trading_pairs: i64,
    pub socket: Option<bool>,
    pub exchange_url: Option<String>,
    pub updated: i64,
}

impl Exchange {
    fn from_payload(raw: ExchangePayload) -> Result<Self> {
        Ok(Self {
            rank: raw.rank.to_i64("rank")?,
            percent_total_volume: raw
                .percent_total_volume
                .as_ref()
                .map(|v| v.to_f64("percentTotalVolume"))
                .transpose()?,
            volume_usd: raw
                .volume_usd
                .as_ref()
                .map(|v| v.to_f64("volumeUsd"))
                .transpose()?,
            trading_pairs: raw.trading_pairs.to_i64("tradingPairs")?,
            updated: raw.updated.to_i64("updated")?,
            exchange_id: raw.exchange_id,
            name: raw.name,
            socket: raw.socket,
            exchange_url: raw.exchange_url,
        })
    }

    /// Parse a full response body (`{"data": [...], "timestamp": ...}`).
    pub fn parse_response(body: &[u8]) -> Result<Vec<Exchange>> {
        let envelope: ExchangesEnvelope = serde_json::from_slice(body)
            .map_err(|e| EtlError::parse(EXCHANGES_SOURCE, e.to_string()))?;
        envelope.data.into_iter().map(Exchange::from_payload).collect()
    }

    pub fn schema() -> Schema {
        Schema::new(vec![
            Column::new("exchangeId", ColumnType::Text),
            Column::new("name", ColumnType::Text),
            Column::new("rank", ColumnType::Integer),
            Column::new("percentTotalVolume", ColumnType::Float),
            Column::new("volumeUsd", ColumnType::Float),
            Column::new("tradingPairs", ColumnType::Integer),
            Column::new("socket", ColumnType::Boolean),
            Column::new("exchangeUrl", ColumnType::Text),
            Column::new("updated", ColumnType::Integer),
        ])
    }

    pub fn into_row(self) -> Vec<Value> {
        vec![
            Value::Text(self.exchange_id),
            Value::Text(self.name),
            Value::Integer(self.rank),
            self.percent_total_volume.into(),
            self.volume_usd.into(),
            Value::Integer(self.trading_pairs),
            self.socket.into(),
            self.exchange_url.into(),
            Value::Integer(self.updated),
        ]
    }

    pub fn to_record_set(exchanges: Vec<Exchange>) -> RecordSet {
        RecordSet::new(
            Self::schema(),
            exchanges.into_iter().map(Exchange::into_row).collect(),
        )
    }
}

/// Positional row of a GHCN-Daily by-station file (no header line).
#[derive(Debug, Deserialize)]
struct WeatherRow(
    String,
    String,
    String,
    i64,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
);

const WEATHER_SOURCE: &str = "weather";

/// One daily observation of one element at one station.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherObservation {
    pub station_id: String,
    pub date: NaiveDate,
    pub element: String,
    pub data_value: i64,
    pub m_flag: Option<String>,
    pub q_flag: Option<String>,
    pub s_flag: Option<String>,
    pub obs_time: Option<String>,
}

impl WeatherObservation {
    fn from_row(row: WeatherRow) -> Result<Self> {
        let WeatherRow(station_id, date, element, data_value, m_flag, q_flag, s_flag, obs_time) =
            row;
        let date = NaiveDate::parse_from_str(date.trim(), "%Y%m%d").map_err(|e| {
            EtlError::parse(WEATHER_SOURCE, format!("bad DATE '{}': {}", date, e))
        })?;
        Ok(Self {
            station_id,
            date,
            element,
            data_value,
            m_flag,
            q_flag,
            s_flag,
            obs_time,
        })
    }

    pub fn parse_csv(bytes: &[u8]) -> Result<Vec<WeatherObservation>> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(bytes);
        rdr.deserialize::<WeatherRow>()
            .map(|row| {
                let row = row.map_err(|e| EtlError::parse(WEATHER_SOURCE, e.to_string()))?;
                WeatherObservation::from_row(row)
            })
            .collect()
    }

    pub fn schema() -> Schema {
        Schema::new(vec![
            Column::new("ID", ColumnType::Text),
            Column::new("DATE", ColumnType::Date),
            Column::new("ELEMENT", ColumnType::Text),
            Column::new("DATA_VALUE", ColumnType::Integer),
            Column::new("M_FLAG", ColumnType::Text),
            Column::new("Q_FLAG", ColumnType::Text),
            Column::new("S_FLAG", ColumnType::Text),
            Column::new("OBS_TIME", ColumnType::Text),
        ])
    }

    pub fn into_row(self) -> Vec<Value> {
        vec![
            Value::Text(self.station_id),
            Value::Date(self.date),
            Value::Text(self.element),
            Value::Integer(self.data_value),
            self.m_flag.into(),
            self.q_flag.into(),
            self.s_flag.into(),
            self.obs_time.into(),
        ]
    }

    pub fn to_record_set(observations: Vec<WeatherObservation>) -> RecordSet {
        RecordSet::new(
            Self::schema(),
            observations
                .into_iter()
                .map(WeatherObservation::into_row)
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exchanges_response() {
        let body = serde_json::json!({
            "data": [
                {
                    "exchangeId": "itbit",
                    "name": "Itbit",
                    "rank": "33",
                    "percentTotalVolume": null,
                    "volumeUsd": null,
                    "tradingPairs": "0",
                    "socket": null,
                    "exchangeUrl": "https://www.itbit.com/",
                    "updated": 0
                },
                {
                    "exchangeId": "binance",
                    "name": "Binance",
                    "rank": "1",
                    "percentTotalVolume": "31.5",
                    "volumeUsd": "1500000000.25",
                    "tradingPairs": "1200",
                    "socket": true,
                    "exchangeUrl": "https://www.binance.com/",
                    "updated": 1726084388658i64
                }
            ],
            "timestamp": 1726084388658i64
        });
        let exchanges = Exchange::parse_response(body.to_string().as_bytes()).unwrap();

        assert_eq!(exchanges.len(), 2);
        assert_eq!(exchanges[0].rank, 33);
        assert_eq!(exchanges[0].percent_total_volume, None);
        assert_eq!(exchanges[1].volume_usd, Some(1_500_000_000.25));
        assert_eq!(exchanges[1].socket, Some(true));

        let rs = Exchange::to_record_set(exchanges);
        assert_eq!(rs.len(), 2);
        assert_eq!(rs.rows[1][5], Value::Integer(1200));
    }

    #[test]
    fn test_parse_exchanges_rejects_missing_data_array() {
        let err = Exchange::parse_response(br#"{"error": "unauthorized"}"#).unwrap_err();
        assert!(matches!(err, EtlError::ParseError { ref source_name, .. } if source_name == "exchanges"));
    }

    #[test]
    fn test_parse_exchanges_rejects_non_numeric_rank() {
        let body = br#"{"data": [{"exchangeId": "x", "name": "X", "rank": "first",
            "tradingPairs": "1", "updated": 0}]}"#;
        let err = Exchange::parse_response(body).unwrap_err();
        assert!(err.to_string().contains("rank"));
    }

    #[test]
    fn test_parse_weather_csv() {
        let csv = "ASN00002024,20240101,PRCP,0,,,a,\nASN00002024,20240102,TMAX,312,,,a,0900\n";
        let rows = WeatherObservation::parse_csv(csv.as_bytes()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(rows[0].m_flag, None);
        assert_eq!(rows[0].s_flag.as_deref(), Some("a"));
        assert_eq!(rows[1].data_value, 312);
        assert_eq!(rows[1].obs_time.as_deref(), Some("0900"));
    }

    #[test]
    fn test_parse_weather_csv_rejects_bad_date() {
        let err = WeatherObservation::parse_csv(b"ASN00002024,2024-01-01,PRCP,0,,,,\n").unwrap_err();
        assert!(err.to_string().contains("bad DATE"));
    }
}
