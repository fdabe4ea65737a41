//! Price table and lookup CSV parsing.
//!
//! The market metrics export stores operation and typology as numeric
//! codes; [`join_price_rows`] resolves them through the dimension tables
//! and produces new [`PriceRecord`]s without touching the raw rows.

use std::collections::BTreeMap;
use std::io::Read;

use csv::StringRecord;
use price_map_geography_models::TractId;
use price_map_market_models::{OperationType, Period, PriceRecord};
use serde::Deserialize;

use crate::IngestError;

/// One row of the price table as stored on disk.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawPriceRow {
    /// Census tract code, possibly unpadded or float-formatted.
    #[serde(rename = "CENSUSTRACT")]
    pub tract: String,
    /// Period label.
    #[serde(rename = "PERIOD")]
    pub period: String,
    /// Operation code, resolved through the operation lookup.
    #[serde(rename = "ADOPERATIONID")]
    pub operation_id: String,
    /// Typology code, resolved through the typology lookup.
    #[serde(rename = "ADTYPOLOGYID")]
    pub typology_id: String,
    /// Asking price per square meter; empty cells are `None`.
    #[serde(rename = "UNITPRICE_ASKING")]
    pub price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct LookupRow {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "SHORTNAME")]
    short_name: String,
}

/// Code to short name dimension table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupTable {
    /// Table name used in error messages.
    pub name: String,
    entries: BTreeMap<String, String>,
}

impl LookupTable {
    /// Builds a table from (id, short name) pairs.
    pub fn new(
        name: impl Into<String>,
        entries: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        Self {
            name: name.into(),
            entries: entries.into_iter().collect(),
        }
    }

    /// Short name of `id`.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::UnknownLookupId`] if the table has no such
    /// id.
    pub fn resolve(&self, id: &str) -> Result<&str, IngestError> {
        self.entries
            .get(id.trim())
            .map(String::as_str)
            .ok_or_else(|| IngestError::UnknownLookupId {
                table: self.name.clone(),
                id: id.trim().to_string(),
            })
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn csv_reader<R: Read>(input: R, delimiter: u8) -> Result<csv::Reader<R>, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    // Headers are matched case-insensitively.
    let headers: StringRecord = reader
        .headers()?
        .iter()
        .map(|header| header.trim().to_ascii_uppercase())
        .collect();
    reader.set_headers(headers);

    Ok(reader)
}

/// Reads the price table.
///
/// # Errors
///
/// Returns [`IngestError::Csv`] if the input is not valid CSV or a row
/// lacks a required column.
pub fn read_price_rows<R: Read>(input: R, delimiter: u8) -> Result<Vec<RawPriceRow>, IngestError> {
    let mut reader = csv_reader(input, delimiter)?;
    let mut rows = Vec::new();
    for row in reader.deserialize::<RawPriceRow>() {
        rows.push(row?);
    }
    Ok(rows)
}

/// Reads an `ID;SHORTNAME[;DESCRIPTION]` lookup table.
///
/// # Errors
///
/// Returns [`IngestError::Csv`] if the input is not valid CSV or a row
/// lacks a required column.
pub fn read_lookup<R: Read>(
    name: &str,
    input: R,
    delimiter: u8,
) -> Result<LookupTable, IngestError> {
    let mut reader = csv_reader(input, delimiter)?;
    let mut entries = Vec::new();
    for row in reader.deserialize::<LookupRow>() {
        let row = row?;
        entries.push((row.id, row.short_name));
    }
    Ok(LookupTable::new(name, entries))
}

/// Normalizes identifiers, parses periods and resolves lookup codes.
///
/// # Errors
///
/// * [`IngestError::Identifier`] for a malformed tract code
/// * [`IngestError::Period`] for an unparseable period
/// * [`IngestError::UnknownLookupId`] for a code missing from a lookup
/// * [`IngestError::UnknownOperation`] for an operation short name other
///   than sale/rent
pub fn join_price_rows(
    rows: &[RawPriceRow],
    operations: &LookupTable,
    typologies: &LookupTable,
) -> Result<Vec<PriceRecord>, IngestError> {
    let mut operation_types = BTreeMap::new();

    rows.iter()
        .map(|row| {
            let short_name = operations.resolve(&row.operation_id)?;
            let operation = match operation_types.get(short_name) {
                Some(&operation) => operation,
                None => {
                    let operation: OperationType =
                        short_name
                            .parse()
                            .map_err(|_| IngestError::UnknownOperation {
                                value: short_name.to_string(),
                            })?;
                    operation_types.insert(short_name.to_string(), operation);
                    operation
                }
            };

            Ok(PriceRecord {
                tract: TractId::parse(&row.tract)?,
                period: Period::parse(&row.period)?,
                operation,
                typology: typologies.resolve(&row.typology_id)?.to_string(),
                price: row.price,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRICES: &str = "\
censustract;Period;ADOPERATIONID;ADTYPOLOGYID;UNITPRICE_ASKING;EXTRA
801901001;2020Q1;1;1;4200.5;x
0801901001.0;2020Q1;2;1;15.2;x
801901002;2020Q2;1;2;;x
";

    const OPERATIONS: &str = "ID;SHORTNAME;DESCRIPTION\n1;sale;Venta\n2;rent;Alquiler\n";
    const TYPOLOGIES: &str = "ID;SHORTNAME\n1;flat\n2;penthouse\n";

    fn lookups() -> (LookupTable, LookupTable) {
        (
            read_lookup("operations", OPERATIONS.as_bytes(), b';').unwrap(),
            read_lookup("typologies", TYPOLOGIES.as_bytes(), b';').unwrap(),
        )
    }

    #[test]
    fn reads_rows_with_case_insensitive_headers() {
        let rows = read_price_rows(PRICES.as_bytes(), b';').unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].tract, "801901001");
        assert_eq!(rows[0].price, Some(4200.5));
        assert_eq!(rows[2].price, None);
    }

    #[test]
    fn joins_lookups_into_records() {
        let rows = read_price_rows(PRICES.as_bytes(), b';').unwrap();
        let (operations, typologies) = lookups();
        assert_eq!(operations.len(), 2);

        let records = join_price_rows(&rows, &operations, &typologies).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].tract.as_str(), "0801901001");
        assert_eq!(records[1].tract, records[0].tract);
        assert_eq!(records[0].operation, OperationType::Sale);
        assert_eq!(records[1].operation, OperationType::Rent);
        assert_eq!(records[2].typology, "penthouse");
        assert_eq!(records[2].period.to_string(), "2020-04-01");
        assert_eq!(records[2].price, None);
    }

    #[test]
    fn unknown_lookup_id() {
        let mut rows = read_price_rows(PRICES.as_bytes(), b';').unwrap();
        rows[1].typology_id = "9".to_string();
        let (operations, typologies) = lookups();
        assert!(matches!(
            join_price_rows(&rows, &operations, &typologies),
            Err(IngestError::UnknownLookupId { table, id }) if table == "typologies" && id == "9"
        ));
    }

    #[test]
    fn unknown_operation_name() {
        let rows = read_price_rows(PRICES.as_bytes(), b';').unwrap();
        let operations = LookupTable::new(
            "operations",
            [
                ("1".to_string(), "sale".to_string()),
                ("2".to_string(), "share".to_string()),
            ],
        );
        let (_, typologies) = lookups();
        assert!(matches!(
            join_price_rows(&rows, &operations, &typologies),
            Err(IngestError::UnknownOperation { value }) if value == "share"
        ));
    }

    #[test]
    fn invalid_tract_code() {
        let mut rows = read_price_rows(PRICES.as_bytes(), b';').unwrap();
        rows[0].tract = "08A".to_string();
        let (operations, typologies) = lookups();
        assert!(matches!(
            join_price_rows(&rows, &operations, &typologies),
            Err(IngestError::Identifier(_))
        ));
    }
}
