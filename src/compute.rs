use crate::data::{Grid, Table, ACCOUNT_TYPE, BALANCE, PAYMENT_STATUS};
use rust_decimal::{prelude::ToPrimitive, Decimal};
use std::{
    collections::{BTreeMap, HashMap},
    iter::Sum,
    ops::Add,
    str::FromStr,
};

/// Digits kept when rendering totals and averages.
pub const SUMMARY_DIGITS: u32 = 2;

/// A balance, or a sum or mean of balances. It stays exact while it fits in a
/// `Decimal`; past that range (about 7.9e28) it is carried on as an `f64`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Amount {
    Exact(Decimal),
    Approx(f64),
}

impl Amount {
    pub const ZERO: Amount = Amount::Exact(Decimal::ZERO);

    fn to_f64(self) -> f64 {
        match self {
            Amount::Exact(value) => value.to_f64().unwrap_or_default(),
            Amount::Approx(value) => value,
        }
    }

    /// Mean of `count` values adding up to `self`. Exact means are rounded
    /// half-to-even here; approximate ones are rounded when rendered.
    fn mean(self, count: u32) -> Amount {
        match self {
            Amount::Exact(sum) => {
                Amount::Exact((sum / Decimal::from(count)).round_dp(SUMMARY_DIGITS))
            }
            Amount::Approx(sum) => Amount::Approx(sum / f64::from(count)),
        }
    }

    /// Round half-to-even and always show exactly two decimals, never "-0.00".
    fn two_places(self) -> String {
        match self {
            Amount::Exact(value) => {
                let mut value = value.round_dp(SUMMARY_DIGITS);
                value.rescale(SUMMARY_DIGITS);
                if value.is_zero() {
                    value.set_sign_positive(true);
                }
                value.to_string()
            }
            Amount::Approx(value) => {
                let text = format!("{value:.2}");
                match text.strip_prefix('-') {
                    Some(rest) if rest.chars().all(|c| c == '0' || c == '.') => rest.to_owned(),
                    _ => text,
                }
            }
        }
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount::Exact(value)
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, other: Amount) -> Amount {
        if let (Amount::Exact(a), Amount::Exact(b)) = (self, other) {
            if let Some(sum) = a.checked_add(b) {
                return Amount::Exact(sum);
            }
        }
        Amount::Approx(self.to_f64() + other.to_f64())
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, Add::add)
    }
}

/// Read a `balance` cell. Plain and scientific notation are accepted and surrounding
/// whitespace is ignored. Finite numbers too large for a `Decimal` come back as
/// `Amount::Approx`; anything else (empty, "abc", "inf") counts as zero.
pub(crate) fn coerce_balance(cell: &str) -> Amount {
    let cell = cell.trim();
    if let Ok(value) = Decimal::from_str(cell).or_else(|_| Decimal::from_scientific(cell)) {
        return Amount::Exact(value);
    }
    match cell.parse::<f64>() {
        Ok(value) if value.is_finite() => Amount::Approx(value),
        _ => Amount::ZERO,
    }
}

/// The figures behind the "Summary" tab. Category lists are kept in the order they
/// must be written: counts by descending frequency (ties in first-seen order),
/// averages by category value, the way a sorted group-by hands them out.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Summary {
    pub total: Amount,
    pub payment_status: Vec<(String, usize)>,
    pub account_type: Vec<(String, usize)>,
    pub average_by_type: Vec<(String, Amount)>,
}

impl Summary {
    pub fn from_table(table: &Table) -> Self {
        let balances: Vec<Amount> = match table.column(BALANCE) {
            Some(cells) => cells.map(coerce_balance).collect(),
            None => vec![Amount::ZERO; table.len()],
        };
        let total = balances.iter().copied().sum();
        let payment_status = table.column(PAYMENT_STATUS).map(count_values);
        let account_type = table.column(ACCOUNT_TYPE).map(count_values);
        let average_by_type = table
            .column(ACCOUNT_TYPE)
            .map(|types| average_by(types, &balances));
        Self {
            total,
            payment_status: payment_status.unwrap_or_default(),
            account_type: account_type.unwrap_or_default(),
            average_by_type: average_by_type.unwrap_or_default(),
        }
    }

    /// Lay the report out as it appears in the sheet: the metric block, then one
    /// section per breakdown, each preceded by a single blank `["", ""]` row.
    pub fn to_grid(&self) -> Grid {
        let mut rows = vec![
            pair("Metric", "Value"),
            pair("Total balance", &self.total.two_places()),
        ];

        rows.push(pair("", ""));
        rows.push(pair("Payment status", "Count"));
        for (status, count) in &self.payment_status {
            rows.push(pair(status, &count.to_string()));
        }

        rows.push(pair("", ""));
        rows.push(pair("Account type", "Count"));
        for (kind, count) in &self.account_type {
            rows.push(pair(kind, &count.to_string()));
        }

        rows.push(pair("", ""));
        rows.push(pair("Account type", "Average balance"));
        for (kind, average) in &self.average_by_type {
            rows.push(pair(kind, &average.two_places()));
        }

        Grid::new(rows)
    }
}

/// Shortcut for `Summary::from_table(table).to_grid()`.
pub(crate) fn summary_report(table: &Table) -> Grid {
    Summary::from_table(table).to_grid()
}

fn pair(left: &str, right: &str) -> Vec<String> {
    vec![left.to_owned(), right.to_owned()]
}

/// Empty cells are treated as missing and not counted.
fn count_values<'a>(cells: impl Iterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<(String, usize)> = Vec::new();
    for cell in cells.filter(|c| !c.is_empty()) {
        match seen.get(cell) {
            Some(&idx) => counts[idx].1 += 1,
            None => {
                seen.insert(cell, counts.len());
                counts.push((cell.to_owned(), 1));
            }
        }
    }
    // stable: equal counts keep first-seen order
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

fn average_by<'a>(
    keys: impl Iterator<Item = &'a str>,
    balances: &[Amount],
) -> Vec<(String, Amount)> {
    let mut groups: BTreeMap<&str, (Amount, u32)> = BTreeMap::new();
    for (key, balance) in keys.zip(balances) {
        if key.is_empty() {
            continue;
        }
        let group = groups.entry(key).or_insert((Amount::ZERO, 0));
        group.0 = group.0 + *balance;
        group.1 += 1;
    }
    groups
        .into_iter()
        .map(|(key, (sum, n))| (key.to_owned(), sum.mean(n)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{coerce_balance, summary_report, Amount, Summary};
    use crate::{data::Table, read::read_table};
    use rust_decimal_macros::dec;

    fn table(csv: &str) -> Table {
        read_table(csv.as_bytes()).unwrap()
    }

    fn exact(key: &str, value: rust_decimal::Decimal) -> (String, Amount) {
        (key.to_string(), Amount::Exact(value))
    }

    #[test]
    fn test_coercion_falls_back_to_zero() {
        assert_eq!(coerce_balance("abc"), Amount::ZERO);
        assert_eq!(coerce_balance(""), Amount::ZERO);
        assert_eq!(coerce_balance("  "), Amount::ZERO);
        assert_eq!(coerce_balance("inf"), Amount::ZERO);
        assert_eq!(coerce_balance(" 12.5 "), Amount::from(dec!(12.5)));
        assert_eq!(coerce_balance("-50.5"), Amount::from(dec!(-50.5)));
        assert_eq!(coerce_balance("1e3"), Amount::from(dec!(1000)));
    }

    #[test]
    fn test_out_of_range_balance_is_still_a_number() {
        assert_eq!(coerce_balance("1e30"), Amount::Approx(1e30));
        let report = summary_report(&table("balance,account_type\n1e30,A\n5,A\n"));
        assert_eq!(
            report.rows()[1],
            ["Total balance", "1000000000000000019884624838656.00"]
        );
        assert_eq!(
            report.rows().last().unwrap(),
            &["A", "500000000000000009942312419328.00"]
        );
    }

    #[test]
    fn test_sum_past_decimal_range_does_not_panic() {
        let ledger = table(
            "\
balance,                       account_type
79228162514264337593543950335, A
1,                             A
",
        );
        let summary = Summary::from_table(&ledger);
        assert!(matches!(summary.total, Amount::Approx(total) if total > 7.9e28));
        assert!(matches!(summary.average_by_type[0].1, Amount::Approx(_)));
        let report = summary.to_grid();
        assert!(report.rows()[1][1].ends_with(".00"));
    }

    #[test]
    fn test_total() {
        let ledger = table("balance\n100\n-50.5\nx\n0\n");
        assert_eq!(Summary::from_table(&ledger).total, Amount::from(dec!(49.5)));
        let report = summary_report(&ledger);
        assert_eq!(report.rows()[1], ["Total balance", "49.50"]);
    }

    #[test]
    fn test_missing_balance_column() {
        let summary = Summary::from_table(&table("account_type\nA\nB\n"));
        assert_eq!(summary.total, Amount::ZERO);
        assert_eq!(summary.average_by_type, [exact("A", dec!(0)), exact("B", dec!(0))]);
    }

    #[test]
    fn test_average_by_account_type() {
        let report = summary_report(&table(
            "\
account_type, balance
A,            10
A,            30
B,            5
",
        ));
        let rows = report.rows();
        let at = rows
            .iter()
            .position(|r| r == &["Account type", "Average balance"])
            .unwrap();
        assert_eq!(rows[at + 1..], [["A", "20.00"], ["B", "5.00"]]);
    }

    #[test]
    fn test_unparseable_balance_counts_in_average_as_zero() {
        let summary = Summary::from_table(&table(
            "\
account_type, balance
A,            10
A,            abc
A,
",
        ));
        assert_eq!(summary.average_by_type, [exact("A", dec!(3.33))]);
    }

    #[test]
    fn test_averages_round_half_to_even() {
        let summary = Summary::from_table(&table(
            "\
account_type, balance
A,            0.125
B,            0.135
",
        ));
        assert_eq!(
            summary.average_by_type,
            [exact("A", dec!(0.12)), exact("B", dec!(0.14))]
        );
    }

    #[test]
    fn test_counts_by_descending_frequency() {
        let summary = Summary::from_table(&table(
            "\
payment_status, account_type
late,           savings
paid,           checking
paid,           savings
pending,        checking
,               savings
",
        ));
        assert_eq!(
            summary.payment_status,
            [
                ("paid".to_string(), 2),
                ("late".to_string(), 1),
                ("pending".to_string(), 1)
            ]
        );
        assert_eq!(
            summary.account_type,
            [("savings".to_string(), 3), ("checking".to_string(), 2)]
        );
    }

    #[test]
    fn test_null_markers_are_not_categories() {
        let summary = Summary::from_table(&table(
            "\
name,  balance, payment_status, account_type
alice, 10,      paid,           checking
bob,   5,       null,           NaN
",
        ));
        assert_eq!(summary.payment_status, [("paid".to_string(), 1)]);
        assert_eq!(summary.account_type, [("checking".to_string(), 1)]);
        assert_eq!(summary.average_by_type, [exact("checking", dec!(10))]);
        assert_eq!(summary.total, Amount::from(dec!(15)));
    }

    #[test]
    fn test_full_report_layout() {
        let report = summary_report(&table(
            "\
balance, payment_status, account_type
100,     paid,           checking
25.25,   late,           savings
-5,      paid,           checking
",
        ));
        assert_eq!(
            report.rows(),
            [
                ["Metric", "Value"],
                ["Total balance", "120.25"],
                ["", ""],
                ["Payment status", "Count"],
                ["paid", "2"],
                ["late", "1"],
                ["", ""],
                ["Account type", "Count"],
                ["checking", "2"],
                ["savings", "1"],
                ["", ""],
                ["Account type", "Average balance"],
                ["checking", "47.50"],
                ["savings", "25.25"],
            ]
        );
    }

    #[test]
    fn test_empty_sections_keep_their_separators() {
        let report = summary_report(&table("name\nalice\n"));
        assert_eq!(
            report.rows(),
            [
                ["Metric", "Value"],
                ["Total balance", "0.00"],
                ["", ""],
                ["Payment status", "Count"],
                ["", ""],
                ["Account type", "Count"],
                ["", ""],
                ["Account type", "Average balance"],
            ]
        );
    }

    #[test]
    fn test_negative_zero_renders_plain() {
        let report = summary_report(&table("balance\n-0.001\n"));
        assert_eq!(report.rows()[1], ["Total balance", "0.00"]);
        assert_eq!(Amount::Approx(-0.001).two_places(), "0.00");
    }
}
