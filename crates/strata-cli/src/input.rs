//! CSV batch inputs.
//!
//! The upstream staging layer hands over cleaned batches as CSV files
//! whose headers match the records' serialized field names (camelCase).
//! Parsing stops at the first malformed row: a batch file that cannot be
//! read in full never reaches an engine, which keeps "reject a cleaned
//! record" (engine policy) separate from "the file itself is broken"
//! (caller error).

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};

use strata_dims::CustomerRecord;
use strata_ingest::StagedFact;

/// Reads a customer batch CSV.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or any row fails to
/// parse.
pub fn read_customer_batch(path: &Path) -> Result<Vec<CustomerRecord>> {
    let file =
        File::open(path).with_context(|| format!("open customer batch {}", path.display()))?;
    parse_customer_batch(file).with_context(|| format!("parse customer batch {}", path.display()))
}

/// Reads a staged fact batch CSV.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or any row fails to
/// parse.
pub fn read_fact_batch(path: &Path) -> Result<Vec<StagedFact>> {
    let file = File::open(path).with_context(|| format!("open fact batch {}", path.display()))?;
    parse_fact_batch(file).with_context(|| format!("parse fact batch {}", path.display()))
}

fn parse_customer_batch(reader: impl Read) -> Result<Vec<CustomerRecord>> {
    let mut csv = csv::Reader::from_reader(reader);
    let mut records = Vec::new();
    for (line, row) in csv.deserialize::<CustomerRecord>().enumerate() {
        records.push(row.with_context(|| format!("row {}", line + 2))?);
    }
    Ok(records)
}

fn parse_fact_batch(reader: impl Read) -> Result<Vec<StagedFact>> {
    let mut csv = csv::Reader::from_reader(reader);
    let mut facts = Vec::new();
    for (line, row) in csv.deserialize::<StagedFact>().enumerate() {
        facts.push(row.with_context(|| format!("row {}", line + 2))?);
    }
    Ok(facts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use strata_dims::CardType;
    use strata_ingest::{Channel, TransactionStatus};

    const CUSTOMER_CSV: &str = "\
customerId,sequence,effectiveDate,accountOpenDate,cardType,creditLimit,firstName,lastName,email,age,state,employmentStatus
CUST00000001,1,2024-06-15,2021-01-04,Standard,12000,Ada,Moreno,ada.moreno@example.com,41,CO,employed
CUST00000002,2,2024-06-15,2022-09-12,Premium,30000,Noor,Haddad,noor.haddad@example.com,37,WA,self-employed
";

    const FACT_CSV: &str = "\
transactionId,customerId,eventDate,amount,merchantName,categoryCode,channel,status,ingestedAt
TXN-0001,CUST00000001,2024-06-10,42.50,Cascade Grocers,groceries,in-store,approved,2024-06-11T01:00:00Z
TXN-0002,CUST00000002,2024-06-12,310.00,Harborview Hotel,hotels,online,approved,2024-06-13T01:00:00Z
";

    #[test]
    fn customer_batch_parses() {
        let records = parse_customer_batch(CUSTOMER_CSV.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].customer_id, "CUST00000001");
        assert_eq!(records[0].card_type, CardType::Standard);
        assert_eq!(
            records[1].effective_date,
            NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
        );
        assert_eq!(records[1].credit_limit, 30_000);
    }

    #[test]
    fn fact_batch_parses() {
        let facts = parse_fact_batch(FACT_CSV.as_bytes()).unwrap();
        assert_eq!(facts.len(), 2);
        assert_eq!(facts[0].transaction_id, "TXN-0001");
        assert_eq!(facts[0].channel, Channel::InStore);
        assert_eq!(facts[1].status, TransactionStatus::Approved);
        assert_eq!(
            facts[1].ingested_at,
            "2024-06-13T01:00:00Z".parse::<chrono::DateTime<chrono::Utc>>().unwrap()
        );
    }

    #[test]
    fn malformed_row_names_its_line() {
        let csv = "\
transactionId,customerId,eventDate,amount,merchantName,categoryCode,channel,status,ingestedAt
TXN-0001,CUST00000001,not-a-date,42.50,Cascade Grocers,groceries,in-store,approved,2024-06-11T01:00:00Z
";
        let err = parse_fact_batch(csv.as_bytes()).unwrap_err();
        assert!(format!("{err:#}").contains("row 2"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = read_customer_batch(Path::new("/nonexistent/batch.csv")).unwrap_err();
        assert!(format!("{err:#}").contains("open customer batch"));
    }
}
