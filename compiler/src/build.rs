//! フレーズテーブルのビルドモジュール
//!
//! テキスト形式のフレーズテーブルを読み込み、コンパクトなバイナリ辞書を書き出します。

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use minphr::errors::MinphrError;
use minphr::model::builder::DEFAULT_KEYS_PER_BLOCK;
use minphr::{PhraseTableBuilder, ScoreTransform};

use clap::Parser;

/// ビルドコマンドの引数
#[derive(Parser, Debug)]
#[clap(
    name = "build",
    about = "A program to build a compact phrase table."
)]
pub struct Args {
    /// Text phrase table (`source ||| target ||| scores`).
    #[clap(short = 'i', long)]
    table_in: PathBuf,

    /// File to which the binary phrase table is output (usually `*.minphr`).
    #[clap(short = 'o', long)]
    table_out: PathBuf,

    /// Stores max(ln(score), -100) instead of the raw scores.
    #[clap(long)]
    log_scores: bool,

    /// Number of source phrases per index block.
    /// Smaller blocks make on-disk lookups read less at a time.
    #[clap(long, default_value_t = DEFAULT_KEYS_PER_BLOCK)]
    keys_per_block: usize,
}

/// ビルド処理中に発生する可能性のあるエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// 入出力エラー
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// 辞書構築エラー
    #[error("Phrase table building failed: {0}")]
    Minphr(#[from] MinphrError),
}

/// ビルドコマンドを実行する
///
/// # エラー
///
/// ファイルの読み書きや辞書構築に失敗した場合、`BuildError`を返します。
pub fn run(args: Args) -> Result<(), BuildError> {
    let transform = if args.log_scores {
        ScoreTransform::FloorLog
    } else {
        ScoreTransform::Identity
    };

    eprintln!("Reading the phrase table...");
    let builder = PhraseTableBuilder::from_reader(File::open(&args.table_in)?, transform)?
        .keys_per_block(args.keys_per_block)?;
    eprintln!("Read {} source phrases", builder.num_entries());

    eprintln!("Writing the compact phrase table...");
    let mut wtr = BufWriter::new(File::create(&args.table_out)?);
    builder.write(&mut wtr)?;
    wtr.flush()?;

    eprintln!("Successfully built the phrase table to {}", args.table_out.display());
    Ok(())
}
