/// Interactive CLI for trying slips against a local wallet
use rust_decimal::Decimal;
use slipway::db::SqliteDatabase;
use slipway::domain::models::{
    BetSlip, BetType, LegRequest, MarketType, Pricing, SlipRequest, ValidationResult,
};
use slipway::service::SlipwayService;
use std::io::{self, Write};
use std::str::FromStr;
use uuid::Uuid;

pub struct Repl {
    service: SlipwayService<SqliteDatabase>,
    current_user_id: Option<Uuid>,
    legs: Vec<LegRequest>,
}

impl Repl {
    pub fn new(service: SlipwayService<SqliteDatabase>) -> Self {
        Self {
            service,
            current_user_id: None,
            legs: Vec::new(),
        }
    }

    pub async fn run(&mut self) {
        println!("🎟️  Welcome to Slipway CLI 🎟️");
        println!("Type 'help' for available commands\n");

        loop {
            print!("> ");
            if io::stdout().flush().is_err() {
                break;
            }

            let mut input = String::new();
            match io::stdin().read_line(&mut input) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let input = input.trim();

            if input.is_empty() {
                continue;
            }

            let parts: Vec<&str> = input.split_whitespace().collect();
            let command = parts[0];

            match command {
                "help" => self.show_help(),
                "wallet" => self.open_wallet(&parts[1..]).await,
                "deposit" => self.deposit(&parts[1..]).await,
                "balance" => self.show_balance().await,
                "leg" => self.add_leg(&parts[1..]),
                "legs" => self.list_legs(),
                "clear" => {
                    self.legs.clear();
                    println!("🧹 Slip cleared");
                }
                "quote" => self.quote(&parts[1..]),
                "place" => self.place(&parts[1..]).await,
                "release" => self.release(&parts[1..]).await,
                "bets" => self.list_bets().await,
                "quit" | "exit" => break,
                _ => println!("Unknown command: {}", command),
            }
        }

        println!("Good luck! 🍀");
    }

    fn show_help(&self) {
        println!(
            r#"
Available Commands:
==================

Wallet:
  wallet <balance>                   Open a wallet and use it
  deposit <amount>                   Credit the current wallet
  balance                            Show the current balance

Slip:
  leg <game> <league|-> <market> <side> <line|-> <american> [stake]
                                     Add a leg (market: moneyline, spread, total, prop)
  legs                               List legs on the slip
  clear                              Remove all legs
  quote <type> <stake> [points]      Price the slip (type: straight, parlay, teaser, sgp, if-bet)
  place <type> <stake> [points]      Place the slip against the current wallet

Bets:
  bets                               List bets for the current wallet
  release <reservation_id>           Release a held reservation

Other:
  help                               Show this help
  quit                               Exit the CLI

Examples:
  wallet 500
  leg g1 NFL spread KC -7.5 -110
  leg g2 NFL total over 47.5 -110
  quote teaser 100 6
"#
        );
    }

    async fn open_wallet(&mut self, args: &[&str]) {
        let balance = match args.first().and_then(|s| Decimal::from_str(s).ok()) {
            Some(balance) => balance,
            None => {
                println!("Usage: wallet <balance>");
                return;
            }
        };

        match self.service.open_wallet(None, balance).await {
            Ok(account) => {
                println!("✅ Wallet opened: {}", account.user_id);
                println!("   Balance: {}", account.balance);
                self.current_user_id = Some(account.user_id);
            }
            Err(e) => println!("❌ Error: {}", e),
        }
    }

    async fn deposit(&mut self, args: &[&str]) {
        let Some(user_id) = self.require_user() else {
            return;
        };
        let amount = match args.first().and_then(|s| Decimal::from_str(s).ok()) {
            Some(amount) => amount,
            None => {
                println!("Usage: deposit <amount>");
                return;
            }
        };

        match self.service.deposit(user_id, amount).await {
            Ok(account) => println!("✅ New balance: {}", account.balance),
            Err(e) => println!("❌ Error: {}", e),
        }
    }

    async fn show_balance(&self) {
        let Some(user_id) = self.require_user() else {
            return;
        };

        match self.service.get_wallet(user_id).await {
            Ok(account) => println!(
                "👛 Balance: {} (version {})",
                account.balance, account.version
            ),
            Err(e) => println!("❌ Error: {}", e),
        }
    }

    fn add_leg(&mut self, args: &[&str]) {
        if args.len() < 6 {
            println!("Usage: leg <game> <league|-> <market> <side> <line|-> <american> [stake]");
            return;
        }

        let market_type = match args[2].to_ascii_lowercase().as_str() {
            "moneyline" | "ml" => MarketType::Moneyline,
            "spread" => MarketType::Spread,
            "total" => MarketType::Total,
            "prop" => MarketType::Prop,
            other => {
                println!("❌ Unknown market: {}", other);
                return;
            }
        };

        let line = match args[4] {
            "-" => None,
            raw => match Decimal::from_str(raw) {
                Ok(line) => Some(line),
                Err(_) => {
                    println!("❌ Bad line: {}", raw);
                    return;
                }
            },
        };

        let price_american = match args[5].parse::<i32>() {
            Ok(price) => price,
            Err(_) => {
                println!("❌ Bad price: {}", args[5]);
                return;
            }
        };

        let stake = args.get(6).and_then(|s| Decimal::from_str(s).ok());

        self.legs.push(LegRequest {
            game_id: args[0].to_string(),
            league: (args[1] != "-").then(|| args[1].to_string()),
            market_type,
            side: args[3].to_string(),
            line,
            price_american,
            stake,
        });
        println!("➕ Leg {} added", self.legs.len());
    }

    fn list_legs(&self) {
        if self.legs.is_empty() {
            println!("Slip is empty");
            return;
        }

        println!("\nLegs on slip:");
        for (i, leg) in self.legs.iter().enumerate() {
            println!(
                "  {}. {} {} {} {} @ {}{}",
                i + 1,
                leg.game_id,
                leg.market_type.as_str(),
                leg.side,
                leg.line.map(|l| l.to_string()).unwrap_or_default(),
                leg.price_american,
                leg.stake
                    .map(|s| format!(" (stake {})", s))
                    .unwrap_or_default()
            );
        }
    }

    fn quote(&self, args: &[&str]) {
        let Some(request) = self.slip_request(args) else {
            return;
        };

        match self.service.quote(&request) {
            Ok(slip) => print_slip(&slip),
            Err(result) => print_rejection(&result),
        }
    }

    async fn place(&mut self, args: &[&str]) {
        let Some(user_id) = self.require_user() else {
            return;
        };
        let Some(request) = self.slip_request(args) else {
            return;
        };

        match self.service.place_bet(user_id, request).await {
            Ok(placed) => {
                println!("✅ Bet placed: {}", placed.bet.id);
                println!("   Reservation: {}", placed.reservation_id);
                print_slip(&placed.bet.slip);
                self.legs.clear();
            }
            Err(slipway::service::ServiceError::Rejected(result)) => print_rejection(&result),
            Err(e) => println!("❌ Error: {}", e),
        }
    }

    async fn release(&self, args: &[&str]) {
        let reservation_id = match args.first().and_then(|s| Uuid::parse_str(s).ok()) {
            Some(id) => id,
            None => {
                println!("Usage: release <reservation_id>");
                return;
            }
        };

        match self.service.release_reservation(reservation_id).await {
            Ok(true) => println!("↩️  Stake returned to wallet"),
            Ok(false) => println!("Nothing to release; reservation already settled"),
            Err(e) => println!("❌ Error: {}", e),
        }
    }

    async fn list_bets(&self) {
        let Some(user_id) = self.require_user() else {
            return;
        };

        match self.service.get_bets_for_user(user_id).await {
            Ok(bets) if bets.is_empty() => println!("No bets yet"),
            Ok(bets) => {
                println!("\nBets:");
                for (i, bet) in bets.iter().enumerate() {
                    println!(
                        "  {}. {} | stake {} | to return {} | {}",
                        i + 1,
                        bet.bet_type,
                        bet.stake,
                        bet.potential_payout,
                        bet.id
                    );
                }
            }
            Err(e) => println!("❌ Error: {}", e),
        }
    }

    fn require_user(&self) -> Option<Uuid> {
        if self.current_user_id.is_none() {
            println!("❌ No wallet selected. Open one with 'wallet <balance>' first.");
        }
        self.current_user_id
    }

    fn slip_request(&self, args: &[&str]) -> Option<SlipRequest> {
        if args.len() < 2 {
            println!("Usage: <quote|place> <type> <stake> [points]");
            return None;
        }

        let Some(bet_type) = BetType::parse(args[0]) else {
            println!("❌ Unknown bet type: {}", args[0]);
            return None;
        };
        let Ok(stake) = Decimal::from_str(args[1]) else {
            println!("❌ Bad stake: {}", args[1]);
            return None;
        };
        let teaser_points = args.get(2).and_then(|s| Decimal::from_str(s).ok());

        Some(SlipRequest {
            bet_type,
            legs: self.legs.clone(),
            stake,
            teaser_points,
            claimed_odds: None,
            claimed_payout: None,
        })
    }
}

fn print_slip(slip: &BetSlip) {
    println!("\n🧾 {} slip | stake {}", slip.bet_type(), slip.stake());
    for (i, leg) in slip.legs().iter().enumerate() {
        let selection = &leg.selection;
        let line = match (selection.line, leg.adjusted_line) {
            (Some(line), Some(adjusted)) => format!(" {} -> {}", line, adjusted),
            (Some(line), None) => format!(" {}", line),
            _ => String::new(),
        };
        println!(
            "  {}. {} {} {}{} @ {}",
            i + 1,
            selection.game_id,
            selection.market_type.as_str(),
            selection.side,
            line,
            selection.price_american
        );
    }

    match slip.pricing() {
        Pricing::Combined { combined_odds } => println!("  Combined odds: {}", combined_odds),
        Pricing::Sequential { steps } => {
            for step in steps {
                println!(
                    "  Leg {} risks {} to return {}",
                    step.leg + 1,
                    step.at_risk,
                    step.payout_if_won
                );
            }
        }
    }
    println!("  Potential payout: {}", slip.potential_payout());
    for warning in slip.warnings() {
        println!("  ⚠️  {}", warning);
    }
}

fn print_rejection(result: &ValidationResult) {
    println!("🚫 Slip rejected:");
    for error in &result.errors {
        println!("  - {}", error);
    }
    for warning in &result.warnings {
        println!("  ⚠️  {}", warning);
    }
}
