//! Roll a handful of dice expressions, or the ones given on the command line.
//!
//! ```sh
//! cargo run -p vtt-core --example roll_dice -- "2d6+3" "1d20-1"
//! ```

use vtt_core::{process_chat, ChatOutcome, DiceExpression, RngRoller};

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let expressions: Vec<&str> = if args.is_empty() {
        vec!["1d20", "2d6", "1d20+5", "2d6+3", "8d6", "d8 - 1", "3d6 + 1d4 + 2"]
    } else {
        args.iter().map(String::as_str).collect()
    };

    println!("=== Rolling dice ===\n");
    for notation in expressions {
        let expr = DiceExpression::parse(notation);
        if expr.is_empty() {
            println!("{notation:>16}  (nothing to roll)");
            continue;
        }
        let result = expr.roll();
        println!("{notation:>16}  {result}");
    }

    println!("\n=== Chat commands (seeded) ===\n");
    let mut roller = RngRoller::seeded(20);
    for line in ["/roll 1d20+2", "/r 4d6", "/roll", "hello table"] {
        match process_chat(line, &mut roller) {
            ChatOutcome::Error { reason } => println!("{line:>16}  error: {reason}"),
            outcome => println!("{line:>16}  {outcome}"),
        }
    }
}
