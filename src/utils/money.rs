// Utilities for monetary values kept in minor currency units

/// Formats cents as a major-unit string with two decimals and a `.` separator,
/// e.g. `1050` -> `"10.50"`.
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Sums fine balances and a transaction fee, all in cents.
pub fn total_cents<I>(balances: I, transaction_fee: i64) -> i64
where
    I: IntoIterator<Item = i64>,
{
    balances.into_iter().sum::<i64>() + transaction_fee
}
