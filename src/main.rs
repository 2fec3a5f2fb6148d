use log::info;

use minicoin::{Address, KeyPair, Ledger, Transaction};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let keypair = KeyPair::generate();
    let wallet = keypair.address();
    info!("Wallet address: {}", wallet);

    let mut ledger = Ledger::new();

    // Mine an empty round to earn the first reward
    ledger.mine_pending_transactions(&wallet);
    info!("Balance after first round: {}", ledger.get_balance_of_address(&wallet));

    // Send half the reward to another address
    let mut transaction = Transaction::new(Some(wallet.clone()), Address("address2".to_string()), 50);
    transaction.sign(&keypair)?;
    ledger.add_transaction(transaction)?;

    ledger.mine_pending_transactions(&wallet);

    info!("Your balance: {}", ledger.get_balance_of_address(&wallet));
    info!("Chain valid: {}", ledger.is_chain_valid()?);

    Ok(())
}
