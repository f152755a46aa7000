use super::*;

#[test]
fn parses_db_ping_command() {
    let cli = Cli::try_parse_from(["oraculo", "db", "ping"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Ping
        })
    ));
}

#[test]
fn parses_db_migrate_command() {
    let cli = Cli::try_parse_from(["oraculo", "db", "migrate"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Migrate
        })
    ));
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["oraculo"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn scan_defaults_to_a_single_pass() {
    let cli = Cli::try_parse_from(["oraculo", "scan"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Scan { schedule: false })
    ));
}

#[test]
fn scan_schedule_flag() {
    let cli = Cli::try_parse_from(["oraculo", "scan", "--schedule"]).unwrap();
    assert!(matches!(cli.command, Some(Commands::Scan { schedule: true })));
}

#[test]
fn scrape_requires_a_site() {
    assert!(Cli::try_parse_from(["oraculo", "scrape"]).is_err());

    let cli = Cli::try_parse_from(["oraculo", "scrape", "pixelatoy"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Scrape { ref site }) if site == "pixelatoy"
    ));
}

#[test]
fn runs_limit_defaults_to_ten() {
    let cli = Cli::try_parse_from(["oraculo", "runs"]).unwrap();
    assert!(matches!(cli.command, Some(Commands::Runs { limit: 10 })));
}

#[test]
fn review_pending_page_defaults_to_first() {
    let cli = Cli::try_parse_from(["oraculo", "review", "pending"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Review {
            command: ReviewCommands::Pending { page: 1 }
        })
    ));
}

#[test]
fn review_bind_takes_pending_and_product_ids() {
    let cli = Cli::try_parse_from(["oraculo", "review", "bind", "12", "3"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Review {
            command: ReviewCommands::Bind {
                pending_id: 12,
                product_id: 3
            }
        })
    ));
}

#[test]
fn review_bind_rejects_non_numeric_ids() {
    assert!(Cli::try_parse_from(["oraculo", "review", "bind", "he-man", "3"]).is_err());
}

#[test]
fn review_purge_shop_is_optional() {
    let cli = Cli::try_parse_from(["oraculo", "review", "purge"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Review {
            command: ReviewCommands::Purge { shop: None }
        })
    ));

    let cli = Cli::try_parse_from(["oraculo", "review", "purge", "--shop", "actiontoys"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Review {
            command: ReviewCommands::Purge { shop: Some(ref s) }
        }) if s == "actiontoys"
    ));
}

#[test]
fn review_merge_takes_source_then_target() {
    let cli = Cli::try_parse_from(["oraculo", "review", "merge", "7", "2"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Review {
            command: ReviewCommands::Merge {
                source_id: 7,
                target_id: 2
            }
        })
    ));
}

#[test]
fn review_deals_parses_decimal_threshold() {
    let cli =
        Cli::try_parse_from(["oraculo", "review", "deals", "--min-discount", "0.35"]).unwrap();
    match cli.command {
        Some(Commands::Review {
            command: ReviewCommands::Deals { min_discount },
        }) => assert_eq!(min_discount, Some(Decimal::new(35, 2))),
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn review_deals_threshold_is_optional() {
    let cli = Cli::try_parse_from(["oraculo", "review", "deals"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Review {
            command: ReviewCommands::Deals { min_discount: None }
        })
    ));
}
