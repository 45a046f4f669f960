use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::str::FromStr;

use stylemap::casm::ChannelSettings;
use stylemap::compare::{compare_notes, notes_from_smf};
use stylemap::config::{RawRenderJob, RenderJob};
use stylemap::midi::SmfCodec;
use stylemap::{parse_style, render_parsed, rendered_to_midi};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
Usage: stylemap render --style <file.sty> --out <file.mid> [--part <marker>] [--bars <n>]
                       [--chart <text> | --chart-file <file>] [--tempo <bpm>] [--ppq <n>]
                       [--trace <file.yaml>]
       stylemap render --job <job.yaml>
       stylemap parts <file.sty>
       stylemap compare <a.mid> <b.mid>";

const NOTE_NAMES: [&str; 12] = ["C", "C#", "D", "Eb", "E", "F", "F#", "G", "Ab", "A", "Bb", "B"];

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        fail(USAGE);
    }

    match args[1].as_str() {
        "render" => render(&args[2..]),
        "parts" => match args.get(2) {
            Some(path) => parts(path),
            None => fail(USAGE),
        },
        "compare" => match (args.get(2), args.get(3)) {
            (Some(a), Some(b)) => compare(a, b),
            _ => fail(USAGE),
        },
        "-h" | "--help" => println!("{}", USAGE),
        other => fail(&format!("Unknown command '{}'\n{}", other, USAGE)),
    }
}

fn fail(message: &str) -> ! {
    eprintln!("{}", message);
    process::exit(1);
}

fn read(path: &Path) -> Vec<u8> {
    match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => fail(&format!("Error reading file '{}': {}", path.display(), e)),
    }
}

fn write(path: &Path, bytes: &[u8]) {
    if let Err(e) = fs::write(path, bytes) {
        fail(&format!("Error writing to '{}': {}", path.display(), e));
    }
}

fn parse_value<T: FromStr>(flag: &str, value: &str) -> T {
    match value.parse() {
        Ok(v) => v,
        Err(_) => fail(&format!("Invalid value for {}: '{}'", flag, value)),
    }
}

fn render(args: &[String]) {
    let mut raw = RawRenderJob::default();
    let mut job_path: Option<PathBuf> = None;

    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        let Some(value) = args.get(i + 1) else {
            fail(&format!("Missing value for {}\n{}", flag, USAGE));
        };
        match flag {
            "--job" => job_path = Some(PathBuf::from(value)),
            "--style" => raw.style = Some(PathBuf::from(value)),
            "--out" => raw.out = Some(PathBuf::from(value)),
            "--part" => raw.part = Some(value.clone()),
            "--bars" => raw.bars = Some(parse_value(flag, value)),
            "--chart" => raw.chart = Some(value.clone()),
            "--chart-file" => raw.chart_file = Some(PathBuf::from(value)),
            "--tempo" => raw.tempo = Some(parse_value(flag, value)),
            "--ppq" => raw.ppq = Some(parse_value(flag, value)),
            "--trace" => raw.trace = Some(PathBuf::from(value)),
            _ => fail(&format!("Unknown option '{}'\n{}", flag, USAGE)),
        }
        i += 2;
    }

    let job = match &job_path {
        Some(path) => RenderJob::from_file(path),
        None => RenderJob::from_raw(raw),
    };
    let mut job = job.unwrap_or_else(|e| fail(&format!("Error: {}", e)));
    if let Err(e) = job.load_chart() {
        fail(&format!("Error: {}", e));
    }

    let bytes = read(&job.style);
    let style = parse_style(&bytes, &SmfCodec).unwrap_or_else(|e| fail(&format!("Error: {}", e)));
    let traced = render_parsed(&style, &job.options, job.trace.is_some())
        .unwrap_or_else(|e| fail(&format!("Render error: {}", e)));
    let midi = rendered_to_midi(&traced.song, &SmfCodec)
        .unwrap_or_else(|e| fail(&format!("Render error: {}", e)));

    write(&job.out, &midi);
    eprintln!(
        "Wrote {} notes ({} ticks) to {}",
        traced.song.notes.len(),
        traced.song.total_ticks,
        job.out.display()
    );

    if let Some(trace_path) = &job.trace {
        let yaml = serde_yaml::to_string(&traced.mappings)
            .unwrap_or_else(|e| fail(&format!("Error serializing trace: {}", e)));
        write(trace_path, yaml.as_bytes());
        eprintln!("Wrote {} mappings to {}", traced.mappings.len(), trace_path.display());
    }
}

fn describe_channel(settings: &ChannelSettings) -> String {
    let root = NOTE_NAMES[(settings.source_root % 12) as usize];
    let quality = settings.source_quality.as_deref().unwrap_or("?");
    let mut line = format!(
        "    ch {:>2} -> {:>2}  {}{}",
        settings.source_channel, settings.dest_channel, root, quality
    );
    if let Some(ctb2) = &settings.ctb2 {
        line.push_str(&format!(
            "  ntr {} ntt {}{}  window {}-{}",
            ctb2.ntr,
            ctb2.ntt,
            if ctb2.bass_on { " bass" } else { "" },
            ctb2.note_low,
            ctb2.note_high
        ));
    }
    line
}

fn parts(path: &str) {
    let bytes = read(Path::new(path));
    let style = parse_style(&bytes, &SmfCodec).unwrap_or_else(|e| fail(&format!("Error: {}", e)));

    println!(
        "{} parts, {} ticks per beat, {} us per beat",
        style.parts.len(),
        style.ticks_per_beat,
        style.tempo
    );
    for part in &style.parts {
        println!(
            "{:<16} {:>6} ticks  {:>4} notes",
            part.marker,
            part.length_ticks,
            part.notes.len()
        );
        if let Some(settings) = style.casm.get(&part.id) {
            for channel in settings.channels.values() {
                println!("{}", describe_channel(channel));
            }
        }
    }
}

fn compare(a: &str, b: &str) {
    let left = notes_from_smf(&read(Path::new(a)), &SmfCodec)
        .unwrap_or_else(|e| fail(&format!("Error reading '{}': {}", a, e)));
    let right = notes_from_smf(&read(Path::new(b)), &SmfCodec)
        .unwrap_or_else(|e| fail(&format!("Error reading '{}': {}", b, e)));

    let diff = compare_notes(&left, &right);
    println!("{}: {} notes", a, diff.len_a);
    println!("{}: {} notes", b, diff.len_b);
    if diff.is_identical() {
        println!("Notes match");
        return;
    }

    println!("{} mismatches", diff.mismatches);
    for (index, l, r) in &diff.samples {
        println!("  #{}: {:?} != {:?}", index, l, r);
    }
    process::exit(1);
}
