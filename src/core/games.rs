//! Games of chance
//!
//! Each game resolves an outcome with the engine's RNG and settles it through
//! the wager path, so games inherit its rules: the stake must be covered by the
//! wallet and a win credits `floor(bet * (multiplier - 1))`. A blackjack push is
//! the one result that settles nothing.

use crate::{
    core::ledger::{Ledger, Receipt, WagerOutcome, ensure_positive},
    errors::{Bucket, Error, Result},
};
use rand::Rng;
use std::{fmt, str::FromStr};
use tracing::{debug, instrument};

/// Coinflip win multiplier.
pub const COINFLIP_MULTIPLIER: f64 = 2.0;

/// A side of a coin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoinSide {
    /// Heads
    Heads,
    /// Tails
    Tails,
}

impl fmt::Display for CoinSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Heads => "heads",
            Self::Tails => "tails",
        })
    }
}

impl FromStr for CoinSide {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "heads" | "h" => Ok(Self::Heads),
            "tails" | "t" => Ok(Self::Tails),
            other => Err(Error::InvalidChoice {
                kind: "coin side",
                value: other.to_string(),
            }),
        }
    }
}

/// Range of a two-dice total a player can bet on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiceRange {
    /// 2 to 6
    Low,
    /// 7 or 8
    Medium,
    /// 9 to 12
    High,
}

impl DiceRange {
    /// Range a total falls into.
    #[must_use]
    pub const fn of(total: u8) -> Self {
        match total {
            0..=6 => Self::Low,
            7 | 8 => Self::Medium,
            _ => Self::High,
        }
    }

    /// Payout multiplier for a correct guess.
    #[must_use]
    pub const fn multiplier(self) -> f64 {
        match self {
            Self::Medium => 3.0,
            Self::Low | Self::High => 2.0,
        }
    }
}

impl fmt::Display for DiceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        })
    }
}

impl FromStr for DiceRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" | "med" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(Error::InvalidChoice {
                kind: "dice range",
                value: other.to_string(),
            }),
        }
    }
}

/// Two six-sided dice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiceRoll {
    /// First die
    pub first: u8,
    /// Second die
    pub second: u8,
}

impl DiceRoll {
    fn roll<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            first: rng.random_range(1..=6),
            second: rng.random_range(1..=6),
        }
    }

    /// Sum of both dice.
    #[must_use]
    pub const fn total(self) -> u8 {
        self.first + self.second
    }

    /// Range the total falls into.
    #[must_use]
    pub const fn range(self) -> DiceRange {
        DiceRange::of(self.total())
    }
}

/// A slot machine symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotSymbol {
    /// Most common
    Cherry,
    /// Lemon
    Lemon,
    /// Orange
    Orange,
    /// Grape
    Grape,
    /// Rare
    Diamond,
    /// Rarest, pays the jackpot
    Seven,
}

impl SlotSymbol {
    /// Every symbol, most common first.
    pub const ALL: [Self; 6] = [
        Self::Cherry,
        Self::Lemon,
        Self::Orange,
        Self::Grape,
        Self::Diamond,
        Self::Seven,
    ];

    /// Relative frequency on a reel.
    #[must_use]
    pub const fn weight(self) -> u32 {
        match self {
            Self::Cherry => 30,
            Self::Lemon => 25,
            Self::Orange => 20,
            Self::Grape => 15,
            Self::Diamond => 8,
            Self::Seven => 2,
        }
    }

    /// Display glyph.
    #[must_use]
    pub const fn emoji(self) -> &'static str {
        match self {
            Self::Cherry => "🍒",
            Self::Lemon => "🍋",
            Self::Orange => "🍊",
            Self::Grape => "🍇",
            Self::Diamond => "💎",
            Self::Seven => "7️⃣",
        }
    }

    fn spin<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let total: u32 = Self::ALL.iter().map(|s| s.weight()).sum();
        let mut pick = rng.random_range(0..total);
        for symbol in Self::ALL {
            if pick < symbol.weight() {
                return symbol;
            }
            pick -= symbol.weight();
        }
        Self::Cherry
    }
}

/// Payout multiplier for a spin, `None` for a loss.
#[must_use]
pub fn slot_multiplier(reels: [SlotSymbol; 3]) -> Option<f64> {
    let [a, b, c] = reels;
    if a == b && b == c {
        return Some(match a {
            SlotSymbol::Seven => 10.0,
            SlotSymbol::Diamond => 7.0,
            _ => 5.0,
        });
    }
    if a == b || b == c || a == c {
        return Some(2.0);
    }
    None
}

/// Profit multiple on the stake for a natural 21.
pub const BLACKJACK_NATURAL_PAYOUT: f64 = 1.5;

/// Total the dealer draws to.
pub const DEALER_STANDS_ON: u8 = 17;

/// A card rank, 1 (ace) to 13 (king). Suits do not affect play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Card(u8);

impl Card {
    /// Card of the given rank, `None` outside 1..=13.
    #[must_use]
    pub fn new(rank: u8) -> Option<Self> {
        (1..=13).contains(&rank).then_some(Self(rank))
    }

    /// Whether this is an ace.
    #[must_use]
    pub const fn is_ace(self) -> bool {
        self.0 == 1
    }

    /// Value with aces counted high: faces are 10, aces 11.
    #[must_use]
    pub const fn value(self) -> u8 {
        match self.0 {
            1 => 11,
            11..=13 => 10,
            rank => rank,
        }
    }

    fn draw<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(rng.random_range(1..=13))
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            1 => f.write_str("A"),
            11 => f.write_str("J"),
            12 => f.write_str("Q"),
            13 => f.write_str("K"),
            rank => write!(f, "{rank}"),
        }
    }
}

/// Best total of a hand: aces count 11 unless that busts it, then 1.
#[must_use]
pub fn hand_value(hand: &[Card]) -> u8 {
    let mut total: u32 = hand.iter().map(|c| u32::from(c.value())).sum();
    let mut soft_aces = hand.iter().filter(|c| c.is_ace()).count();
    while total > 21 && soft_aces > 0 {
        total -= 10;
        soft_aces -= 1;
    }
    u8::try_from(total).unwrap_or(u8::MAX)
}

fn format_hand(hand: &[Card]) -> String {
    hand.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// How a blackjack hand ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlackjackOutcome {
    /// Player's first two cards total 21; pays 1.5x the bet
    Natural,
    /// Dealer went over 21
    DealerBust,
    /// Player beat the dealer
    Win,
    /// Equal totals; the stake is returned
    Push,
    /// Dealer beat the player
    Loss,
}

impl BlackjackOutcome {
    /// Compares finished hands. The player stands on the opening two cards.
    #[must_use]
    pub fn resolve(player: &[Card], dealer: &[Card]) -> Self {
        let player_value = hand_value(player);
        let dealer_value = hand_value(dealer);
        if player.len() == 2 && player_value == 21 {
            Self::Natural
        } else if dealer_value > 21 {
            Self::DealerBust
        } else if player_value > dealer_value {
            Self::Win
        } else if player_value == dealer_value {
            Self::Push
        } else {
            Self::Loss
        }
    }

    /// Wager result and multiplier, `None` for a push.
    #[must_use]
    pub const fn wager(self) -> Option<(WagerOutcome, f64)> {
        match self {
            Self::Natural => Some((WagerOutcome::Won, 1.0 + BLACKJACK_NATURAL_PAYOUT)),
            Self::DealerBust | Self::Win => Some((WagerOutcome::Won, 2.0)),
            Self::Loss => Some((WagerOutcome::Lost, 1.0)),
            Self::Push => None,
        }
    }
}

/// Deals a round: two cards each, then the dealer draws to
/// [`DEALER_STANDS_ON`] unless the player holds a natural.
fn deal_blackjack<R: Rng + ?Sized>(rng: &mut R) -> (Vec<Card>, Vec<Card>) {
    let player = vec![Card::draw(rng), Card::draw(rng)];
    let mut dealer = vec![Card::draw(rng), Card::draw(rng)];
    if hand_value(&player) != 21 {
        while hand_value(&dealer) < DEALER_STANDS_ON {
            dealer.push(Card::draw(rng));
        }
    }
    (player, dealer)
}

/// Result of a blackjack hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlackjackResult {
    /// Player's cards
    pub player: Vec<Card>,
    /// Dealer's cards
    pub dealer: Vec<Card>,
    /// How the hand ended
    pub outcome: BlackjackOutcome,
    /// Settled wager, `None` on a push (nothing is journaled)
    pub receipt: Option<Receipt>,
}

/// Result of a coinflip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinflipResult {
    /// Side the player called
    pub call: CoinSide,
    /// Side the coin landed on
    pub landed: CoinSide,
    /// Settled wager
    pub receipt: Receipt,
}

/// Result of a dice game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiceResult {
    /// Range the player bet on
    pub guess: DiceRange,
    /// What was rolled
    pub roll: DiceRoll,
    /// Settled wager
    pub receipt: Receipt,
}

/// Result of a slot spin.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotsResult {
    /// The three reels
    pub reels: [SlotSymbol; 3],
    /// Multiplier paid, `None` for a loss
    pub multiplier: Option<f64>,
    /// Settled wager
    pub receipt: Receipt,
}

impl Ledger {
    /// Flips a coin; a correct call pays 2x.
    #[instrument(skip(self))]
    pub async fn coinflip(&self, user_id: &str, bet: i64, call: CoinSide) -> Result<CoinflipResult> {
        ensure_positive(bet)?;
        let landed = self.with_rng(|rng| {
            if rng.random_bool(0.5) {
                CoinSide::Heads
            } else {
                CoinSide::Tails
            }
        });
        let outcome = if landed == call {
            WagerOutcome::Won
        } else {
            WagerOutcome::Lost
        };

        let receipt = self
            .settle_wager(
                user_id,
                bet,
                outcome,
                COINFLIP_MULTIPLIER,
                &format!("Coinflip: called {call}, landed {landed}"),
            )
            .await?;
        Ok(CoinflipResult {
            call,
            landed,
            receipt,
        })
    }

    /// Rolls two dice; guessing the range of the total pays 2x (low, high) or 3x (medium).
    #[instrument(skip(self))]
    pub async fn roll_dice(&self, user_id: &str, bet: i64, guess: DiceRange) -> Result<DiceResult> {
        ensure_positive(bet)?;
        let roll = self.with_rng(DiceRoll::roll);
        let outcome = if roll.range() == guess {
            WagerOutcome::Won
        } else {
            WagerOutcome::Lost
        };

        let receipt = self
            .settle_wager(
                user_id,
                bet,
                outcome,
                guess.multiplier(),
                &format!(
                    "Dice: bet {guess}, rolled {} + {} = {}",
                    roll.first,
                    roll.second,
                    roll.total()
                ),
            )
            .await?;
        Ok(DiceResult {
            guess,
            roll,
            receipt,
        })
    }

    /// Spins three weighted reels and pays according to [`slot_multiplier`].
    #[instrument(skip(self))]
    pub async fn play_slots(&self, user_id: &str, bet: i64) -> Result<SlotsResult> {
        ensure_positive(bet)?;
        let reels = self.with_rng(|rng| {
            [
                SlotSymbol::spin(rng),
                SlotSymbol::spin(rng),
                SlotSymbol::spin(rng),
            ]
        });
        let multiplier = slot_multiplier(reels);
        let (outcome, payout) = match multiplier {
            Some(m) => (WagerOutcome::Won, m),
            None => (WagerOutcome::Lost, 1.0),
        };

        let receipt = self
            .settle_wager(
                user_id,
                bet,
                outcome,
                payout,
                &format!(
                    "Slots: {} {} {}",
                    reels[0].emoji(),
                    reels[1].emoji(),
                    reels[2].emoji()
                ),
            )
            .await?;
        Ok(SlotsResult {
            reels,
            multiplier,
            receipt,
        })
    }

    /// Plays one hand of blackjack against the dealer.
    ///
    /// The player stands on the opening two cards. A natural 21 pays
    /// `floor(bet * 1.5)`, any other win pays the bet, and a push returns the
    /// stake without touching the balance or the journal.
    ///
    /// # Errors
    /// `InvalidAmount` for a non-positive bet, `InsufficientFunds` if the wallet
    /// cannot cover the bet (checked for pushes too).
    #[instrument(skip(self))]
    pub async fn play_blackjack(&self, user_id: &str, bet: i64) -> Result<BlackjackResult> {
        ensure_positive(bet)?;
        let (player, dealer) = self.with_rng(deal_blackjack);
        let outcome = BlackjackOutcome::resolve(&player, &dealer);

        let Some((wager, multiplier)) = outcome.wager() else {
            let wallet = self.account(user_id).await?.wallet_balance;
            if wallet < bet {
                return Err(Error::InsufficientFunds {
                    bucket: Bucket::Wallet,
                    available: wallet,
                    required: bet,
                });
            }
            debug!(user_id, bet, "blackjack push");
            return Ok(BlackjackResult {
                player,
                dealer,
                outcome,
                receipt: None,
            });
        };

        let receipt = self
            .settle_wager(
                user_id,
                bet,
                wager,
                multiplier,
                &format!(
                    "Blackjack: player {} ({}) vs dealer {} ({})",
                    format_hand(&player),
                    hand_value(&player),
                    format_hand(&dealer),
                    hand_value(&dealer)
                ),
            )
            .await?;
        Ok(BlackjackResult {
            player,
            dealer,
            outcome,
            receipt: Some(receipt),
        })
    }
}
