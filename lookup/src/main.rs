//! フレーズテーブルを検索するユーティリティ
//!
//! このバイナリは、標準入力の各行を1つの文として空白で分割し、最大フレーズ長までの
//! すべての区間について候補フレーズを出力します。各文の終わりで文単位の資源を解放します。

use std::error::Error;
use std::io::{BufRead, BufWriter, Write};
use std::path::PathBuf;

use minphr::{CompactModel, PhraseTable, ResidencyMode, ScoringContext};

use clap::Parser;

/// コマンドライン引数
#[derive(Parser, Debug)]
#[clap(name = "lookup", about = "Looks up target phrase candidates")]
struct Args {
    /// Compact phrase table. The `.minphr` suffix may be omitted.
    #[clap(short = 'i', long)]
    table_in: PathBuf,

    /// Keeps the index and the phrase store on disk.
    #[clap(long)]
    on_disk: bool,

    /// Maximum number of candidates per span. 0 outputs all candidates.
    #[clap(short = 'L', long, default_value_t = minphr::table::DEFAULT_TABLE_LIMIT)]
    table_limit: usize,

    /// Comma-separated feature weights. Defaults to uniform weights.
    #[clap(short = 'w', long, value_delimiter = ',', allow_hyphen_values = true)]
    weights: Option<Vec<f32>>,

    /// Weight of the target word count.
    #[clap(short = 'p', long, default_value_t = 0.0, allow_hyphen_values = true)]
    word_penalty: f32,
}

/// メイン関数
///
/// 辞書をロードし、標準入力から読み込んだ各文のすべての区間を検索して、
/// `区間\tソースフレーズ\t候補`の形式で標準出力に出力します。
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let mode = if args.on_disk {
        ResidencyMode::OnDisk
    } else {
        ResidencyMode::InMemory
    };

    eprintln!("Loading the phrase table...");
    let model = CompactModel::from_path(&args.table_in, mode)?;
    let num_scores = model.num_scores();
    let weights = args
        .weights
        .unwrap_or_else(|| vec![1.0 / num_scores as f32; num_scores]);
    let scoring = ScoringContext::new(weights, args.word_penalty);

    let table = PhraseTable::new(model, scoring)?.table_limit(args.table_limit);
    let max_len = table.model().max_source_phrase_length();
    let mut worker = table.new_worker();

    eprintln!("Ready to look up");

    let is_tty = atty::is(atty::Stream::Stdout);

    let out = std::io::stdout();
    let mut out = BufWriter::new(out.lock());
    let lines = std::io::stdin().lock().lines();
    for line in lines {
        let line = line?;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        for start in 0..tokens.len() {
            let end_max = tokens.len().min(start + max_len);
            for end in start + 1..=end_max {
                let span = &tokens[start..end];
                let Some(candidates) = worker.lookup(span)? else {
                    continue;
                };
                let source = span.join(" ");
                for cand in candidates.iter() {
                    writeln!(&mut out, "{start}-{end}\t{source}\t{cand}")?;
                }
            }
        }
        out.write_all(b"EOS\n")?;
        if is_tty {
            out.flush()?;
        }
        worker.cleanup_after_sentence();
    }

    Ok(())
}
