//! Spreadsheet row model

use super::{MessageId, ParsedEmail};

/// Number of columns written per message (A through E)
pub const ROW_WIDTH: usize = 5;

/// One spreadsheet row: `(id, sender, subject, date, body)`.
///
/// Rows are append-only; nothing in this crate updates or deletes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRow {
    pub id: MessageId,
    pub sender: String,
    pub subject: String,
    pub date: String,
    pub body: String,
}

impl SheetRow {
    /// Cell values in column order
    pub fn into_values(self) -> Vec<String> {
        vec![self.id.0, self.sender, self.subject, self.date, self.body]
    }
}

impl From<ParsedEmail> for SheetRow {
    fn from(email: ParsedEmail) -> Self {
        Self {
            id: email.id,
            sender: email.sender,
            subject: email.subject,
            date: email.date,
            body: email.body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_column_order() {
        let email = ParsedEmail {
            id: MessageId::new("m1"),
            sender: "Alice <alice@example.com>".to_string(),
            subject: "Quarterly report".to_string(),
            date: "2024-01-15 10:30:00+00:00".to_string(),
            body: "See attached.".to_string(),
        };

        let values = SheetRow::from(email).into_values();
        assert_eq!(values.len(), ROW_WIDTH);
        assert_eq!(
            values,
            vec![
                "m1",
                "Alice <alice@example.com>",
                "Quarterly report",
                "2024-01-15 10:30:00+00:00",
                "See attached.",
            ]
        );
    }
}
