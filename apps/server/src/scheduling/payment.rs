use rust_decimal::{Decimal, RoundingStrategy};

fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Split `paid` across service rows in proportion to their price
/// snapshots. Each share is rounded to 2 decimal places half-away-from
/// zero, and the final row absorbs the remainder so the shares always
/// sum to exactly `paid`. A snapshot total of zero splits equally.
pub fn distribute_paid_price(paid: Decimal, snapshots: &[Decimal]) -> Vec<Decimal> {
    if snapshots.is_empty() {
        return Vec::new();
    }
    if snapshots.len() == 1 {
        return vec![round_money(paid)];
    }

    let total: Decimal = snapshots.iter().copied().sum();
    let paid = round_money(paid);
    let last = snapshots.len() - 1;

    let mut shares = Vec::with_capacity(snapshots.len());
    let mut distributed = Decimal::ZERO;
    for (i, snapshot) in snapshots.iter().enumerate() {
        if i == last {
            shares.push(paid - distributed);
            break;
        }
        let share = if total.is_zero() {
            round_money(paid / Decimal::from(snapshots.len() as i64))
        } else {
            round_money(paid * snapshot / total)
        };
        distributed += share;
        shares.push(share);
    }
    shares
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn sum(shares: &[Decimal]) -> Decimal {
        shares.iter().copied().sum()
    }

    #[test]
    fn test_discounted_pair_splits_proportionally() {
        // 40 + 60 priced, 90 paid: shares keep the 40/60 ratio.
        let shares = distribute_paid_price(d("90"), &[d("40"), d("60")]);
        assert_eq!(shares, vec![d("36"), d("54")]);
    }

    #[test]
    fn test_shares_always_sum_to_paid() {
        let shares = distribute_paid_price(d("100"), &[d("33"), d("33"), d("34")]);
        assert_eq!(sum(&shares), d("100"));
    }

    #[test]
    fn test_last_row_absorbs_rounding_remainder() {
        // Equal snapshots, 100 across three rows: 33.33 + 33.33 + 33.34.
        let shares = distribute_paid_price(d("100"), &[d("50"), d("50"), d("50")]);
        assert_eq!(shares, vec![d("33.33"), d("33.33"), d("33.34")]);
    }

    #[test]
    fn test_single_row_takes_everything() {
        assert_eq!(distribute_paid_price(d("72.50"), &[d("80")]), vec![d("72.50")]);
    }

    #[test]
    fn test_empty_rows_yield_nothing() {
        assert!(distribute_paid_price(d("50"), &[]).is_empty());
    }

    #[test]
    fn test_zero_snapshot_total_splits_equally() {
        let shares = distribute_paid_price(d("30"), &[d("0"), d("0"), d("0")]);
        assert_eq!(shares, vec![d("10"), d("10"), d("10")]);
    }

    #[test]
    fn test_zero_snapshot_total_remainder_to_last() {
        let shares = distribute_paid_price(d("10"), &[d("0"), d("0"), d("0")]);
        assert_eq!(shares, vec![d("3.33"), d("3.33"), d("3.34")]);
        assert_eq!(sum(&shares), d("10"));
    }

    #[test]
    fn test_overpayment_scales_up() {
        let shares = distribute_paid_price(d("120"), &[d("40"), d("60")]);
        assert_eq!(shares, vec![d("48"), d("72")]);
    }

    #[test]
    fn test_zero_paid_zeroes_every_share() {
        let shares = distribute_paid_price(d("0"), &[d("40"), d("60")]);
        assert_eq!(shares, vec![d("0"), d("0")]);
    }

    #[test]
    fn test_rounding_is_half_away_from_zero() {
        // 0.05 over equal halves: 0.025 rounds up to 0.03, last gets 0.02.
        let shares = distribute_paid_price(d("0.05"), &[d("10"), d("10")]);
        assert_eq!(shares, vec![d("0.03"), d("0.02")]);
    }

    #[test]
    fn test_paid_input_rounded_before_split() {
        let shares = distribute_paid_price(d("90.005"), &[d("40"), d("60")]);
        assert_eq!(sum(&shares), d("90.01"));
    }
}
