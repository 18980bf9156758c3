//! minphr 辞書コンパイラのメインエントリーポイント
//!
//! テキスト形式のフレーズテーブルからコンパクトなバイナリ辞書を構築するサブコマンドと、
//! 構築済みの辞書の統計を表示するサブコマンドを提供します。

mod build;
mod info;

use clap::Parser;
use thiserror::Error;

use crate::{build::BuildError, info::InfoError};

/// コマンドライン引数の構造体
#[derive(Parser, Debug)]
#[clap(name = "compile", version)]
struct Cli {
    /// 実行するサブコマンド
    #[clap(subcommand)]
    command: Command,
}

/// 利用可能なサブコマンド
#[derive(Parser, Debug)]
enum Command {
    /// テキスト形式のフレーズテーブルからバイナリ辞書を構築します
    ///
    /// `source ||| target ||| scores` 形式の各行を読み込み、`.minphr` ファイルを生成します。
    Build(build::Args),

    /// 構築済みの辞書の統計を表示します
    Info(info::Args),
}

/// コンパイラの実行中に発生する可能性のあるエラー
#[derive(Debug, Error)]
pub enum CompileError {
    /// 辞書ビルド中のエラー
    #[error(transparent)]
    BuildError(#[from] BuildError),
    /// 辞書読み込み中のエラー
    #[error(transparent)]
    InfoError(#[from] InfoError),
}

fn main() -> Result<(), CompileError> {
    let cli = Cli::parse();
    match cli.command {
        Command::Build(args) => Ok(build::run(args)?),
        Command::Info(args) => Ok(info::run(args)?),
    }
}
