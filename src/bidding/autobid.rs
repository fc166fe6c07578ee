/// 자동 입찰(대리 입찰) 해석기
/// 사람 입찰이 수락된 직후 등록된 상한들을 훑어 대리 반격 입찰을 계산한다.
// region:    --- Imports
use crate::bidding::model::AutoBid;

// endregion: --- Imports

// region:    --- Resolver
/// 해석 결과로 생성되는 대리 입찰
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterBid {
    pub user_id: i64,
    pub amount: i64,
}

/// 대리 입찰 해석
/// - 방금 입찰한 사용자는 제외
/// - `new_highest + bid_unit` 이상을 감당하는 상한이 없으면 반격 없음
/// - 승자는 상한이 가장 큰 사용자, 동률이면 먼저 등록한 사용자
/// - 상한이 하나만 현재가를 초과하면 최소 단위만큼만 올리고,
///   둘 이상이면 차순위 상한 + 단위까지만 지불 (자기 상한으로 캡)
pub fn resolve(
    ceilings: &[AutoBid],
    triggering_bidder: i64,
    new_highest: i64,
    bid_unit: i64,
) -> Option<CounterBid> {
    let mut candidates: Vec<&AutoBid> = ceilings
        .iter()
        .filter(|c| c.user_id != triggering_bidder)
        .collect();
    candidates.sort_by(|a, b| {
        b.max_amount
            .cmp(&a.max_amount)
            .then(a.created_at.cmp(&b.created_at))
    });

    let winner = match candidates.first() {
        Some(c) if c.max_amount >= new_highest + bid_unit => *c,
        _ => return None,
    };

    // 현재가를 초과하는 상한들, 정렬 순서 유지 (첫 번째는 항상 승자)
    let above: Vec<&&AutoBid> = candidates
        .iter()
        .filter(|c| c.max_amount > new_highest)
        .collect();

    let amount = if above.len() >= 2 {
        let runner_up = above[1];
        winner.max_amount.min(runner_up.max_amount + bid_unit)
    } else {
        new_highest + bid_unit
    };

    Some(CounterBid {
        user_id: winner.user_id,
        amount,
    })
}
// endregion: --- Resolver

// region:    --- Tests
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn ceiling(user_id: i64, max_amount: i64, order: i64) -> AutoBid {
        AutoBid {
            auction_id: 1,
            user_id,
            max_amount,
            created_at: Utc::now() + Duration::seconds(order),
        }
    }

    #[test]
    fn no_ceiling_no_counter() {
        assert_eq!(resolve(&[], 1, 1000, 1000), None);
    }

    #[test]
    fn triggering_bidder_is_excluded() {
        let ceilings = vec![ceiling(1, 10_000, 0)];
        assert_eq!(resolve(&ceilings, 1, 1000, 1000), None);
    }

    #[test]
    fn single_ceiling_bids_minimum_increment() {
        let ceilings = vec![ceiling(2, 10_000, 0)];
        let counter = resolve(&ceilings, 1, 1000, 1000).unwrap();
        assert_eq!(counter.user_id, 2);
        assert_eq!(counter.amount, 2000);
    }

    #[test]
    fn proxy_duel_pays_one_unit_over_runner_up() {
        // 상한 A=5000, B=8000, 사람 입찰 1000원 → B가 6000원으로 반격
        let ceilings = vec![ceiling(10, 5000, 0), ceiling(20, 8000, 1)];
        let counter = resolve(&ceilings, 1, 1000, 1000).unwrap();
        assert_eq!(counter.user_id, 20);
        assert_eq!(counter.amount, 6000);
    }

    #[test]
    fn duel_price_is_capped_at_own_ceiling() {
        let ceilings = vec![ceiling(10, 7800, 0), ceiling(20, 8000, 1)];
        let counter = resolve(&ceilings, 1, 1000, 1000).unwrap();
        assert_eq!(counter.user_id, 20);
        assert_eq!(counter.amount, 8000);
    }

    #[test]
    fn tie_goes_to_earliest_registration() {
        let ceilings = vec![ceiling(20, 8000, 5), ceiling(10, 8000, 0)];
        let counter = resolve(&ceilings, 1, 1000, 1000).unwrap();
        assert_eq!(counter.user_id, 10);
    }

    #[test]
    fn ceiling_equal_to_highest_never_counters() {
        let ceilings = vec![ceiling(2, 5000, 0)];
        assert_eq!(resolve(&ceilings, 1, 5000, 1000), None);
    }

    #[test]
    fn ceiling_below_increment_never_counters() {
        // 5500은 5000을 넘지만 5000 + 1000은 감당하지 못함
        let ceilings = vec![ceiling(2, 5500, 0)];
        assert_eq!(resolve(&ceilings, 1, 5000, 1000), None);
    }
}
// endregion: --- Tests
