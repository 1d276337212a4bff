use std::io::{self, Read};

use anyhow::{Context, Result};
use bitcoin::hashes::Hash;
use bitcoin::ScriptBuf;
use clap::{Parser, Subcommand};
use ordswap::utils::logging;
use ordswap::{
    finalize, log_error, Draft, ErrorReport, KeyHandle, MemoryKeystore, Offer, OutPoint,
    PayToWitnessPubkeyHash, ScriptResolver, SignedContainer, SwapError, TxOutput, Txid, Utxo,
};
use serde_json::{json, Value};

#[derive(Parser, Debug)]
#[command(name = "ordswap", version, about = "Two-party swaps over partially signed transactions")]
struct Cli {
    /// Emit debug logs on stderr
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Summarize an offer or any container (base64 or hex, `-` for stdin)
    Inspect { container: String },
    /// Combine two containers over the same skeleton
    Merge { first: String, second: String },
    /// Validate a fully signed container and print the raw transaction
    Finalize { container: String },
    /// Run a complete swap with throwaway in-memory keys
    Demo {
        /// Index of the maker pair in the extended transaction
        #[arg(long, default_value_t = 1)]
        anchor: usize,
    },
}

fn main() {
    let cli = Cli::parse();
    if cli.debug {
        logging::enable_debug();
    }

    match run(cli.command) {
        Ok(output) => print_json(&output),
        Err(err) => {
            match err.downcast_ref::<SwapError>() {
                Some(swap_err) => {
                    let report = ErrorReport::from(swap_err);
                    log_error!(
                        "cli",
                        "Command failed",
                        recoverable = report.recoverable,
                        error = format!("{:#}", err)
                    );
                    print_json(&json!({ "error": report }));
                }
                None => log_error!("cli", "Command failed", error = format!("{:#}", err)),
            }
            std::process::exit(1);
        }
    }
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("error: failed to render output: {}", e),
    }
}

fn run(command: Command) -> Result<Value> {
    match command {
        Command::Inspect { container } => inspect(&read_arg(&container)?),
        Command::Merge { first, second } => merge(&read_arg(&first)?, &read_arg(&second)?),
        Command::Finalize { container } => finalize_container(&read_arg(&container)?),
        Command::Demo { anchor } => demo(anchor),
    }
}

/// `-` reads the value from stdin
fn read_arg(arg: &str) -> Result<String> {
    if arg != "-" {
        return Ok(arg.trim().to_string());
    }
    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("failed to read stdin")?;
    Ok(buffer.trim().to_string())
}

fn inspect(text: &str) -> Result<Value> {
    let container = SignedContainer::from_text(text)?;
    if let Ok(offer) = Offer::from_container(container.clone()) {
        return Ok(json!({
            "kind": "offer",
            "offer": offer.summary(),
        }));
    }

    let tx = container.unsigned_tx();
    Ok(json!({
        "kind": "container",
        "txid": tx.txid().to_string(),
        "inputs": tx.inputs.len(),
        "outputs": tx.outputs.len(),
        "anchor": container.anchor(),
        "fee": container.fee().ok(),
        "fully_signed": container.is_fully_signed(),
        "signatures": container.signature_status(),
    }))
}

fn merge(first: &str, second: &str) -> Result<Value> {
    let a = SignedContainer::from_text(first).context("first container")?;
    let b = SignedContainer::from_text(second).context("second container")?;
    let merged = a.merge(&b)?;
    Ok(json!({
        "container": merged.to_base64(),
        "fully_signed": merged.is_fully_signed(),
    }))
}

fn finalize_container(text: &str) -> Result<Value> {
    let container = SignedContainer::from_text(text)?;
    let final_tx = finalize(&container, &PayToWitnessPubkeyHash)?;
    Ok(json!({
        "txid": final_tx.txid().to_string(),
        "size": final_tx.size(),
        "hex": final_tx.to_hex(),
    }))
}

/// Maker sells a 100000 sat item for 100000 sats; the taker pays from a
/// 100500 sat coin and keeps a 500 sat dummy ahead of the maker pair.
fn demo(anchor: usize) -> Result<Value> {
    let mut keys = MemoryKeystore::new();
    let maker = KeyHandle::new("demo-maker");
    let taker = KeyHandle::new("demo-taker");
    let maker_pk = keys.generate(maker.clone())?;
    let taker_pk = keys.generate(taker.clone())?;
    let maker_script = PayToWitnessPubkeyHash.locking_script(&maker_pk);
    let taker_script = PayToWitnessPubkeyHash.locking_script(&taker_pk);

    let coin = |tag: u8, vout: u32, value: u64, script: &ScriptBuf| {
        Utxo::new(OutPoint::new(Txid::from_byte_array([tag; 32]), vout), value, script.clone())
    };

    let offer = Draft::new(
        coin(0xa0, 0, 100_000, &maker_script),
        TxOutput::new(100_000, maker_script.clone()),
    )
    .with_anchor(anchor)
    .commit(&keys, &maker)?;
    offer.verify(&PayToWitnessPubkeyHash)?;

    let mut builder = offer.extension();
    for i in 0..anchor {
        builder = builder
            .input_before(coin(0xb0, i as u32, 500, &taker_script))
            .output_before(TxOutput::new(500, taker_script.clone()));
    }
    let extended = builder
        .input(coin(0xc0, 0, 100_500, &taker_script))
        .output(TxOutput::new(100_000, taker_script.clone()))
        .build()?;

    let signed = extended.sign_taker_inputs(&keys, &taker)?;
    let final_tx = signed.finalize(&PayToWitnessPubkeyHash)?;

    Ok(json!({
        "offer": offer.to_base64(),
        "summary": offer.summary(),
        "signed": signed.container().to_base64(),
        "final": {
            "txid": final_tx.txid().to_string(),
            "size": final_tx.size(),
            "hex": final_tx.to_hex(),
        },
    }))
}
