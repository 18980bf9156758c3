//! 構築済みの辞書の統計を表示するモジュール

use std::path::PathBuf;

use minphr::errors::MinphrError;
use minphr::model::index::SourceIndex;
use minphr::{CompactModel, ResidencyMode};

use clap::Parser;

/// 統計表示コマンドの引数
#[derive(Parser, Debug)]
#[clap(name = "info", about = "A program to show statistics of a compact phrase table.")]
pub struct Args {
    /// Compact phrase table. The `.minphr` suffix may be omitted.
    #[clap(short = 'i', long)]
    table_in: PathBuf,

    /// Keeps the index and the phrase store on disk while loading.
    #[clap(long)]
    on_disk: bool,
}

/// 統計表示中に発生する可能性のあるエラー
#[derive(Debug, thiserror::Error)]
pub enum InfoError {
    /// 辞書読み込みエラー
    #[error("Loading the phrase table failed: {0}")]
    Minphr(#[from] MinphrError),
}

pub fn run(args: Args) -> Result<(), InfoError> {
    let mode = if args.on_disk {
        ResidencyMode::OnDisk
    } else {
        ResidencyMode::InMemory
    };
    let model = CompactModel::from_path(&args.table_in, mode)?;

    println!("path\t{}", model.path().display());
    println!("source_phrases\t{}", model.index().num_entries());
    println!("index_blocks\t{}", model.index().num_blocks());
    println!("target_phrases\t{}", model.store().num_phrases());
    println!("target_words\t{}", model.store().num_words());
    println!("scores_per_phrase\t{}", model.num_scores());
    println!("max_source_phrase_length\t{}", model.max_source_phrase_length());
    println!("encoded_block_bytes\t{}", model.store().blocks().len());
    Ok(())
}
