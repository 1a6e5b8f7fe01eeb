use crate::domain::ids::{CompanyId, SettlementId, TransactionId, UserId, VehicleId};
use crate::domain::money::Money;
use crate::domain::settlement::Settlement;
use crate::domain::transaction::Transaction;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct TransactionRow {
    transaction: TransactionId,
    vehicle: VehicleId,
    buyer: UserId,
    status: &'static str,
    price: Money,
}

#[derive(Debug, Serialize)]
struct SettlementRow {
    settlement: SettlementId,
    transaction: TransactionId,
    company: CompanyId,
    total: Money,
    commission: Money,
    settlement_amount: Money,
    status: &'static str,
}

/// Writes the final state as two CSV blocks separated by a blank line:
/// transactions first, then settlements.
pub struct ReportWriter<W: Write> {
    out: W,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn write_report(
        &mut self,
        transactions: &[Transaction],
        settlements: &[Settlement],
    ) -> Result<()> {
        {
            let mut wtr = csv::Writer::from_writer(&mut self.out);
            if transactions.is_empty() {
                wtr.write_record(["transaction", "vehicle", "buyer", "status", "price"])?;
            }
            for t in transactions {
                wtr.serialize(TransactionRow {
                    transaction: t.id,
                    vehicle: t.vehicle,
                    buyer: t.buyer,
                    status: t.status.label(),
                    price: t.price,
                })?;
            }
            wtr.flush()?;
        }

        writeln!(self.out)?;

        {
            let mut wtr = csv::Writer::from_writer(&mut self.out);
            if settlements.is_empty() {
                wtr.write_record([
                    "settlement",
                    "transaction",
                    "company",
                    "total",
                    "commission",
                    "settlement_amount",
                    "status",
                ])?;
            }
            for s in settlements {
                wtr.serialize(SettlementRow {
                    settlement: s.id,
                    transaction: s.transaction,
                    company: s.company,
                    total: s.total_amount,
                    commission: s.commission_amount,
                    settlement_amount: s.settlement_amount,
                    status: s.status.label(),
                })?;
            }
            wtr.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::settlement::CommissionPolicy;
    use crate::domain::transaction::TransactionAction;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[test]
    fn test_report_blocks() {
        let now = Utc::now();
        let mut tx = Transaction::request(
            TransactionId(1),
            VehicleId(3),
            UserId(200),
            CompanyId(1),
            Money::new(dec!(20000000)).unwrap(),
            now,
        );
        tx.transition(TransactionAction::Approve, now).unwrap();
        tx.transition(TransactionAction::Complete, now).unwrap();
        let settlement =
            Settlement::for_transaction(SettlementId(1), &tx, &CommissionPolicy::default(), now)
                .unwrap();

        let mut buf = Vec::new();
        ReportWriter::new(&mut buf)
            .write_report(&[tx], &[settlement])
            .unwrap();
        let out = String::from_utf8(buf).unwrap();

        assert!(out.contains("transaction,vehicle,buyer,status,price"));
        assert!(out.contains("1,3,200,completed,20000000"));
        assert!(out.contains(
            "settlement,transaction,company,total,commission,settlement_amount,status"
        ));
        assert!(out.contains("1,1,1,20000000,440000,19560000,pending"));
    }

    #[test]
    fn test_empty_report_keeps_headers() {
        let mut buf = Vec::new();
        ReportWriter::new(&mut buf).write_report(&[], &[]).unwrap();
        let out = String::from_utf8(buf).unwrap();
        assert_eq!(
            out,
            "transaction,vehicle,buyer,status,price\n\nsettlement,transaction,company,total,commission,settlement_amount,status\n"
        );
    }
}
