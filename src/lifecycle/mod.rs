/// 경매 종료 계획
/// 낙찰자 결정과 종료 팬아웃 대상 계산. 종료 시점의 원장 스냅샷만 보고
/// 계산하므로 순수 함수로 둔다.
// region:    --- Imports
use crate::auction::model::Auction;
use crate::bidding::model::Bid;
use crate::notification::NotificationType;
use std::collections::BTreeSet;

// endregion: --- Imports

// region:    --- Close Planning
/// 종료 시 발송 예정 알림
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedNotice {
    pub recipient_id: i64,
    pub kind: NotificationType,
    pub message: String,
}

/// 낙찰자 결정: 원장 최고가 입찰자, 입찰이 없으면 유찰
pub fn determine_winner(bids: &[Bid]) -> Option<i64> {
    bids.iter()
        .max_by_key(|b| (b.amount, std::cmp::Reverse(b.id)))
        .map(|b| b.bidder_id)
}

/// 자연 종료 팬아웃 계획
/// 낙찰자에게 WIN 한 건, 나머지 입찰 참여자 각각에게 LOSE 한 건,
/// 낙찰자가 있으면 판매자에게 SOLD 한 건
pub fn close_fanout_plan(auction: &Auction, bids: &[Bid], winner: Option<i64>) -> Vec<PlannedNotice> {
    let mut plan = Vec::new();
    let bidders: BTreeSet<i64> = bids.iter().map(|b| b.bidder_id).collect();
    let final_price = auction.highest_bid;

    for bidder_id in &bidders {
        if Some(*bidder_id) == winner {
            plan.push(PlannedNotice {
                recipient_id: *bidder_id,
                kind: NotificationType::Win,
                message: format!(
                    "'{}' 경매에서 {}원에 낙찰되었습니다.",
                    auction.title, final_price
                ),
            });
        } else {
            plan.push(PlannedNotice {
                recipient_id: *bidder_id,
                kind: NotificationType::Lose,
                message: format!("'{}' 경매가 종료되어 낙찰받지 못했습니다.", auction.title),
            });
        }
    }

    if winner.is_some() {
        plan.push(PlannedNotice {
            recipient_id: auction.seller_id,
            kind: NotificationType::Sold,
            message: format!(
                "'{}' 경매가 {}원에 판매 완료되었습니다.",
                auction.title, final_price
            ),
        });
    }

    plan
}
// endregion: --- Close Planning

// endregion: --- Tests
