/*
    Records per key from a single fragment.

    Statistics are sampled from one fragment out of P. Scaling the observed row count to
    the table is linear, scaling the observed number of distinct keys is not: a key with
    X rows spread randomly over P fragments is missing from one given fragment with
    probability (1 - 1/P)^X. With R rows in the table and R/X distinct keys, one fragment
    is expected to see

        U(X) = R/X * (1 - (1 - 1/P)^X)

    distinct keys. Given the observed U_obs we look for X with U(X) = U_obs and return the
    factor f = R / (X * U_obs) that turns U_obs into a table wide distinct count.
    The order of the shortcuts and all thresholds are part of the contract.
 */

pub const MIN_UNQ: f64 = 0.1;
pub const MIN_ROWS: f64 = 25.0;
pub const MAX_RPK_FRAG_MULTIPLE: f64 = 10.0;
pub const MAX_ITERATIONS: usize = 100;
pub const CONVERGENCE_DELTA: f64 = 1.0;

// 1 when the fragment saw only few distinct keys, P when every row had its own key.
// The ratio uses the fragment rows r, not the table rows R = P * r. With R the factor
// of an all unique fragment would be 1 + (P-1)/P^(P-1) and never reach P.
fn closed_form(frags: f64, rows: f64, unq: f64) -> f64 {
    let ratio = if rows > 0.0 { (unq / rows).clamp(0.0, 1.0) } else { 0.0 };
    1.0 + (frags - 1.0) * ratio.powf(frags - 1.0)
}

pub fn expected_unq(total_rows: f64, frags: f64, rpk: f64) -> f64 {
    total_rows / rpk * (1.0 - (1.0 - 1.0 / frags).powf(rpk))
}

// `rows` and `unq` are single fragment observations
pub fn unq_factor(frag_count: u32, rows: f64, unq: f64) -> f64 {
    let frags = frag_count.max(1) as f64;
    let f0 = closed_form(frags, rows, unq);
    if unq < MIN_UNQ {
        return f0;
    }
    if rows < MIN_ROWS {
        return f0;
    }
    let total_rows = rows * frags;
    let mut rpk = total_rows / (f0 * unq);
    if rpk > MAX_RPK_FRAG_MULTIPLE * frags {
        // Every fragment sees every key, iterating gains nothing
        return f0;
    }
    let mut step = 0.5 * rpk;
    let mut direction = 0;
    let mut prev = expected_unq(total_rows, frags, rpk);
    for _ in 0..MAX_ITERATIONS {
        let next_direction = if prev < unq { -1 } else { 1 };
        if direction != 0 && next_direction != direction {
            step *= 0.5;
        }
        direction = next_direction;
        rpk = (rpk + direction as f64 * step).max(1.0);
        let est = expected_unq(total_rows, frags, rpk);
        let delta = (est - prev).abs();
        prev = est;
        if delta < CONVERGENCE_DELTA {
            break;
        }
    }
    total_rows / (rpk * unq)
}

// Table wide records per key implied by the factor
pub fn estimate_rpk(frag_count: u32, rows: f64, unq: f64) -> f64 {
    let total_rows = rows * frag_count.max(1) as f64;
    total_rows / (unq_factor(frag_count, rows, unq) * unq)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAGS: u32 = 16;
    const TOTAL_ROWS: f64 = 60_000_000.0;

    fn exact_observation(rpk: f64) -> f64 {
        expected_unq(TOTAL_ROWS, FRAGS as f64, rpk).round()
    }

    #[test]
    fn test_converges_within_five_percent() {
        let rows = TOTAL_ROWS / FRAGS as f64;
        for true_rpk in [5.0, 10.0, 25.0, 80.0] {
            let unq = exact_observation(true_rpk);
            let rpk = estimate_rpk(FRAGS, rows, unq);
            assert!((rpk - true_rpk).abs() / true_rpk < 0.05, "rpk {} estimated as {}", true_rpk, rpk);
        }
    }

    #[test]
    fn test_small_rpk() {
        let rows = TOTAL_ROWS / FRAGS as f64;
        for true_rpk in [1.0, 1.5, 2.0] {
            let unq = exact_observation(true_rpk);
            let rpk = estimate_rpk(FRAGS, rows, unq);
            assert!((rpk - true_rpk).abs() < 0.5, "rpk {} estimated as {}", true_rpk, rpk);
        }
    }

    #[test]
    fn test_all_unique_fragment_scales_by_fragments() {
        let factor = unq_factor(FRAGS, 1_000_000.0, 1_000_000.0);
        assert!((factor - FRAGS as f64).abs() < 0.5, "factor {}", factor);
    }

    #[test]
    fn test_shortcuts() {
        // Nothing observed: closed form, which is 1 at zero
        assert_eq!(unq_factor(4, 1000.0, 0.0), 1.0);
        assert_eq!(unq_factor(4, 0.0, 0.05), 1.0);
        // Too few rows: closed form, no iteration
        let expected = 1.0 + 3.0 * (10.0f64 / 20.0).powf(3.0);
        assert_eq!(unq_factor(4, 20.0, 10.0), expected);
        // Keys so frequent that every fragment sees all of them
        let f = unq_factor(4, 100_000.0, 10.0);
        assert!((f - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_fragment_is_identity() {
        assert_eq!(unq_factor(1, 1000.0, 10.0), 1.0);
        assert!((unq_factor(1, 1000.0, 900.0) - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_factor_not_linear() {
        // The factor never exceeds the fragment count
        for unq in [30.0, 40.0, 60.0, 89.0] {
            let f = unq_factor(4, 90.0, unq);
            assert!(f >= 1.0 && f <= 4.0 + 1e-9, "unq {} factor {}", unq, f);
        }
    }
}
