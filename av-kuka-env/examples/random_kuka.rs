use anyhow::Result;
use av_core::{
    record::{BufferedRecorder, Record},
    util, Configurable, Env as _,
};
use av_kuka_env::{
    FcnSegmenter, KukaEnv, KukaEnvConfig, PyBulletBackend, RandomPolicy, SegmentationModel,
    SegmenterConfig,
};
use clap::Parser;
use serde::Serialize;
use std::{convert::TryFrom, fs::File};

type Env = KukaEnv<PyBulletBackend, FcnSegmenter>;

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Configuration file of the environment; defaults are used if omitted
    #[arg(long)]
    config: Option<String>,

    /// Segmentation network (alexnet, vgg)
    #[arg(long, default_value = "alexnet")]
    model: SegmentationModel,

    /// Show the simulator GUI
    #[arg(long, default_value_t = false)]
    render: bool,

    /// Number of episodes
    #[arg(long, default_value_t = 5)]
    n_episodes: usize,

    /// Steps per episode
    #[arg(long, default_value_t = 200)]
    max_steps: usize,

    /// Random seed
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Output CSV file
    #[arg(long, default_value = "random_kuka_eval.csv")]
    csv: String,
}

#[derive(Debug, Serialize)]
struct KukaRecord {
    episode: usize,
    step: usize,
    reward: f32,
    position_gain: f32,
    x_min: f32,
    y_min: f32,
    x_max: f32,
    y_max: f32,
}

impl TryFrom<&Record> for KukaRecord {
    type Error = anyhow::Error;

    fn try_from(record: &Record) -> Result<Self> {
        let obs = record.get_array1("obs")?;
        Ok(Self {
            episode: record.get_scalar("episode")? as _,
            step: record.get_scalar("step")? as _,
            reward: record.get_scalar("reward")?,
            position_gain: record.get_scalar("position_gain")?,
            x_min: obs[0],
            y_min: obs[1],
            x_max: obs[2],
            y_max: obs[3],
        })
    }
}

fn env_config(args: &Args) -> Result<KukaEnvConfig> {
    let config = match args.config.as_ref() {
        Some(path) => KukaEnvConfig::load(path)?,
        None => KukaEnvConfig::default()
            .max_steps(args.max_steps)
            .segmenter(SegmenterConfig::default().model(args.model)),
    };
    Ok(config.render(args.render))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = env_config(&args)?;
    let mut env = Env::build(&config, args.seed as i64)?;
    let mut policy = RandomPolicy::new(args.seed);
    let mut recorder = BufferedRecorder::new();

    let returns = util::eval_with_recorder(&mut env, &mut policy, args.n_episodes, &mut recorder)?;
    log::info!("Returns = {:?}", returns);

    let mut wtr = csv::WriterBuilder::new().from_writer(File::create(&args.csv)?);
    for record in recorder.iter() {
        wtr.serialize(KukaRecord::try_from(record)?)?;
    }
    wtr.flush()?;

    env.close()
}
