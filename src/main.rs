//! # 分離型 物理情報ニューラルネットワーク (SPINN)
//!
//! `clap` クレートを利用して、コマンドラインから`train`（学習）と`eval`（評価）の
//! 機能を個別に実行できます。
//!
//! ## 使い方
//!
//! ### 学習
//! ```bash
//! cargo run --release -- train --equation klein-gordon3d --model spinn --epochs 5000
//! ```
//!
//! ### 評価
//! ```bash
//! cargo run --release -- eval --dir results/klein_gordon3d/spinn/<run_name>
//! ```

use clap::Parser;
use spinn::cli::{Cli, Commands};
use spinn::{inference, training};
use std::process;
use tracing::{error, info};
use tracing_subscriber::filter::LevelFilter;

fn main() {
    let cli = Cli::parse();

    let log_level_filter = cli
        .log_level
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::INFO);
    tracing_subscriber::fmt()
        .with_max_level(log_level_filter)
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Train(args) => {
            let out = args.out.clone();
            let config = args.into_config();
            let dir = training::result_dir(&out, &config);
            info!("結果ディレクトリ: {}", dir.display());
            training::run(&config, &dir).map(|summary| {
                info!(
                    "最良l2: {:.8}, 最終l2: {:.8}, 最終l1: {:.8}",
                    summary.best_l2, summary.final_l2, summary.final_l1
                );
            })
        }
        Commands::Eval(args) => inference::run(&args.dir).map(|_| ()),
    };

    if let Err(e) = result {
        error!("{e}");
        process::exit(1);
    }
}
