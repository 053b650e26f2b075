// 该文件是 Shanan （山南西风） 项目的一部分。
// src/task.rs - 检测任务
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::{
  frame::RgbFrame, model::DetectionSet, model::Model, output::Render, pipeline::Detector,
};

/// 预热轮次，不计入平均耗时
const WARMUP_RUNS: usize = 2;

pub trait Task<I, D, O>: Sized {
  type Error;
  fn run_task(self, input: I, detector: D, output: O) -> Result<(), Self::Error>;
}

pub struct OneShotTask;

impl<
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = RgbFrame>,
  M: Model,
  O: Render<RgbFrame, DetectionSet, Error = RE>,
> Task<I, Detector<M>, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, detector: Detector<M>, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始检测...");
    let now = Instant::now();
    let result = detector.detect(&frame.view())?;
    let elapsed = now.elapsed();
    info!("检测完成，耗时: {:.2?}", elapsed);
    output.render_result(&frame, &result)?;
    info!("渲染完成，总耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// 在同一帧上重复检测，统计平均耗时并检查结果是否一致
#[derive(Debug)]
pub struct RepeatShotTask {
  times: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self { times: 1000 }
  }
}

impl RepeatShotTask {
  pub fn with_times(mut self, times: usize) -> Self {
    self.times = times;
    self
  }
}

impl<
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = RgbFrame>,
  M: Model,
  O: Render<RgbFrame, DetectionSet, Error = RE>,
> Task<I, Detector<M>, O> for RepeatShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, detector: Detector<M>, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始检测...");

    let mut first: Option<DetectionSet> = None;
    let mut mismatches = 0usize;
    let mut times = Vec::new();
    times.try_reserve_exact(self.times)?;
    for i in 0..self.times {
      let now = Instant::now();
      let result = detector.detect(&frame.view())?;
      let elapsed = now.elapsed();
      info!("({})检测完成，耗时: {:.2?}", i, elapsed);
      output.render_result(&frame, &result)?;
      times.push(elapsed);

      if first.is_none() {
        first = Some(result);
      } else if first.as_ref() != Some(&result) {
        mismatches += 1;
        warn!("({})检测结果与首次运行不一致", i);
      }
    }

    if mismatches > 0 {
      warn!("{} 次运行的结果与首次运行不一致", mismatches);
    }

    match average_after_warmup(&times) {
      Some(average) => warn!("平均检测时间: {:.2?}", average),
      None => info!("运行次数不足 {}，不统计平均时间", WARMUP_RUNS + 1),
    }

    Ok(())
  }
}

fn average_after_warmup(times: &[Duration]) -> Option<Duration> {
  let measured = times.get(WARMUP_RUNS..)?;
  if measured.is_empty() {
    return None;
  }
  Some(measured.iter().sum::<Duration>() / measured.len() as u32)
}
