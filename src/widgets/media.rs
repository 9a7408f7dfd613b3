/*
 *  widgets/media.rs
 *
 *  lydash - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Now-playing ticker, surfaces on track change
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use log::{debug, info};

use crate::config::WidgetConfig;
use crate::draw;
use crate::fonts::{measure_text, Font};
use crate::glyphs;
use crate::raster::GrayRaster;
use crate::sensors::{MediaSensor, MediaSensorFactory, PlayStatus, SensorError, TrackInfo};
use crate::timebase::Timebase;
use super::error_proxy::{draw_error_frame, flash_on};
use super::helper::{Colors, ConfigHelper, DisplayMode};
use super::poller::{PollTask, PolledFrame, PolledState, Poller, PollerConfig, SensorHealth};
use super::registry::Registry;
use super::scroller::Scroller;
use super::{BaseWidget, Rect, Style, Widget, WidgetContext, WidgetError};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub fn register(registry: &Registry) {
    registry.register("winamp", create);
}

pub fn create(cfg: &WidgetConfig, ctx: &WidgetContext) -> Result<Box<dyn Widget>, WidgetError> {
    Ok(Box::new(MediaWidget::new(cfg, ctx)?))
}

/// A new track worth surfacing: the title changed to something non-empty
/// while the play status held and the player is not stopped. Without a
/// previous reading nothing counts as a change.
pub fn is_track_change(prev: Option<&TrackInfo>, cur: &TrackInfo) -> bool {
    let Some(prev) = prev else {
        return false;
    };
    prev.title != cur.title
        && !cur.title.is_empty()
        && prev.status == cur.status
        && cur.status != PlayStatus::Stopped
}

/// Latest player state; `epoch` moves on every detected track change
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NowPlaying {
    pub track: Option<TrackInfo>,
    pub epoch: u64,
}

type SharedState = Arc<RwLock<PolledState<NowPlaying>>>;

struct MediaTask {
    factory: MediaSensorFactory,
    sensor: Option<Box<dyn MediaSensor>>,
    state: SharedState,
    timebase: Arc<dyn Timebase>,
}

impl PollTask for MediaTask {
    fn init(&mut self) -> Result<(), SensorError> {
        self.sensor = None;
        self.sensor = Some((self.factory)()?);
        Ok(())
    }

    fn poll(&mut self, now: Instant) -> Result<(), SensorError> {
        let sensor = self
            .sensor
            .as_mut()
            .ok_or_else(|| SensorError::Unavailable("media sensor not initialised".into()))?;
        let track = sensor.now_playing()?;

        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        let mut np = state.reading.take().unwrap_or_default();
        if let Some(cur) = &track {
            if is_track_change(np.track.as_ref(), cur) {
                debug!("track change: {}", cur.display_line());
                np.epoch += 1;
                state.autohide.trigger_show(now);
            }
        }
        np.track = track;
        state.reading = Some(np);
        Ok(())
    }

    fn on_health(&mut self, health: SensorHealth) {
        let now = self.timebase.now();
        self.state.write().unwrap_or_else(|e| e.into_inner()).record_health(health, now);
    }
}

/// Compositor-side scroll position
struct Ticker {
    scroller: Scroller,
    epoch: u64,
}

pub struct MediaWidget {
    base: BaseWidget,
    font: Font,
    colors: Colors,
    state: SharedState,
    ticker: Mutex<Ticker>,
    poller: Poller,
}

impl MediaWidget {
    pub fn new(cfg: &WidgetConfig, ctx: &WidgetContext) -> Result<Self, WidgetError> {
        let h = ConfigHelper::new(cfg);
        let base = BaseWidget::new(cfg, ctx)?;
        let state: SharedState = Arc::new(RwLock::new(PolledState::new(base.new_autohide(false))));

        let poll = PollerConfig::new(&cfg.id, h.poll_interval(DEFAULT_POLL_INTERVAL));
        info!("{}: media polling every {:?}", cfg.id, poll.interval);
        let task_state = state.clone();
        let factory = ctx.sensors.media.clone();
        let timebase = ctx.timebase.clone();
        let poller = Poller::spawn(poll, ctx.timebase.clone(), move || MediaTask {
            factory,
            sensor: None,
            state: task_state,
            timebase,
        })
        .map_err(|e| WidgetError::SensorFatal(format!("{}: cannot start polling thread: {}", cfg.id, e)))?;

        Ok(Self {
            base,
            font: h.text().font(),
            colors: h.colors_for(DisplayMode::Text),
            state,
            ticker: Mutex::new(Ticker { scroller: Scroller::new(h.scroll()), epoch: 0 }),
            poller,
        })
    }

    pub fn now_playing(&self) -> Option<NowPlaying> {
        self.state.read().unwrap_or_else(|e| e.into_inner()).reading.clone()
    }

    pub fn scroll_offset(&self) -> f64 {
        self.ticker.lock().unwrap_or_else(|e| e.into_inner()).scroller.offset()
    }

    /// Status icon on the left, the rest is the scrolling viewport
    fn layout(&self) -> (Rectangle, Rectangle) {
        let area = self.base.content_area();
        let shift = 8 + 2;
        let icon = Rectangle::new(area.top_left, Size::new(8.min(area.size.width), area.size.height));
        let text = Rectangle::new(
            area.top_left + Point::new(shift, 0),
            Size::new(area.size.width.saturating_sub(shift as u32).max(1), area.size.height),
        );
        (icon, text)
    }

    fn paint_track(&self, raster: &mut GrayRaster, track: &TrackInfo) -> Result<(), WidgetError> {
        let (icon_area, text_area) = self.layout();
        if let Some(icon) = glyphs::glyph("media", track.status.glyph_name()) {
            let y = icon_area.top_left.y + (icon_area.size.height as i32 - icon.height as i32) / 2;
            draw::draw_glyph(raster, &icon, icon_area.top_left.x, y, self.colors.primary)?;
        }

        let line = track.display_line();
        let (tw, th) = measure_text(&line, self.font);
        let mut viewport = GrayRaster::new(text_area.size.width, text_area.size.height, self.base.style().background);
        let ticker = self.ticker.lock().unwrap_or_else(|e| e.into_inner());
        let vertical = ticker.scroller.settings().direction.is_vertical();
        let origins = ticker.scroller.draw_origins();
        drop(ticker);
        let cy = (text_area.size.height as i32 - th as i32) / 2;
        let cx = if tw < text_area.size.width { (text_area.size.width - tw) as i32 / 2 } else { 0 };
        for o in origins {
            let (x, y) = if vertical { (cx, o) } else { (o, cy) };
            draw::draw_text(&mut viewport, &line, self.font, x, y, self.colors.primary)?;
        }
        raster.blit(&viewport, text_area.top_left.x, text_area.top_left.y);
        Ok(())
    }

    /// Step the scroller to `now`, restarting it when the track changed
    fn advance_ticker(&self, track: &TrackInfo, epoch: u64, now: Instant) {
        let (tw, th) = measure_text(&track.display_line(), self.font);
        let (_, text_area) = self.layout();
        let mut ticker = self.ticker.lock().unwrap_or_else(|e| e.into_inner());
        if ticker.epoch != epoch {
            ticker.epoch = epoch;
            ticker.scroller.reset();
        }
        let (size, view) = if ticker.scroller.settings().direction.is_vertical() {
            (th, text_area.size.height)
        } else {
            (tw, text_area.size.width)
        };
        ticker.scroller.update(now, size, view);
    }

    fn paint_absent(&self, raster: &mut GrayRaster) -> Result<(), WidgetError> {
        if let Some(icon) = glyphs::glyph("media", "absent") {
            let area = self.base.content_area();
            let x = area.top_left.x + (area.size.width as i32 - icon.width as i32) / 2;
            let y = area.top_left.y + (area.size.height as i32 - icon.height as i32) / 2;
            draw::draw_glyph(raster, &icon, x, y, self.colors.secondary)?;
        }
        Ok(())
    }
}

impl Widget for MediaWidget {
    fn name(&self) -> &str { self.base.id() }
    fn kind(&self) -> &str { self.base.kind() }
    fn position(&self) -> Rect { self.base.position() }
    fn style(&self) -> Style { self.base.style() }

    fn update_interval(&self) -> Duration {
        self.base.update_interval()
    }

    /// The polling thread owns the player; the ticker moves on render
    fn update(&self) -> Result<(), WidgetError> {
        Ok(())
    }

    fn render(&self) -> Result<Option<GrayRaster>, WidgetError> {
        let now = self.base.now();
        let frame = self.state.read().unwrap_or_else(|e| e.into_inner()).frame(now);
        let mut raster = self.base.blank();
        match frame {
            PolledFrame::Stopped | PolledFrame::Hidden => return Ok(None),
            PolledFrame::Pending => return Ok(Some(self.base.placeholder("..."))),
            PolledFrame::Fatal(since) => {
                draw_error_frame(&mut raster, self.base.content_area(), "MEDIA ERROR", flash_on(since, now))?;
            }
            PolledFrame::Ready(NowPlaying { track: None, .. }) => self.paint_absent(&mut raster)?,
            PolledFrame::Ready(NowPlaying { track: Some(track), epoch }) => {
                self.advance_ticker(&track, epoch, now);
                self.paint_track(&mut raster, &track)?;
            }
        }
        Ok(Some(self.base.finish(raster)))
    }

    fn stop(&self) {
        self.state.write().unwrap_or_else(|e| e.into_inner()).stopped = true;
        self.poller.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::Compositor;
    use crate::sensors::SensorSet;
    use crate::timebase::ManualTimebase;

    fn track(title: &str, status: PlayStatus) -> TrackInfo {
        TrackInfo { title: title.into(), artist: "Artist".into(), album: String::new(), status }
    }

    #[test]
    fn test_track_change_heuristic() {
        let a = track("One", PlayStatus::Playing);
        assert!(!is_track_change(None, &a));
        assert!(!is_track_change(Some(&a), &a));
        assert!(is_track_change(Some(&a), &track("Two", PlayStatus::Playing)));
        assert!(!is_track_change(Some(&a), &track("", PlayStatus::Playing)));
        // status flipped on the same poll
        assert!(!is_track_change(Some(&a), &track("Two", PlayStatus::Paused)));
        let stopped = track("One", PlayStatus::Stopped);
        assert!(!is_track_change(Some(&stopped), &track("Two", PlayStatus::Stopped)));
    }

    struct Playlist(Arc<Mutex<Option<TrackInfo>>>);

    impl MediaSensor for Playlist {
        fn now_playing(&mut self) -> Result<Option<TrackInfo>, SensorError> {
            Ok(self.0.lock().unwrap().clone())
        }
    }

    fn wait_for(pred: impl Fn() -> bool) {
        for _ in 0..400 {
            if pred() {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("condition not reached");
    }

    fn widget(list: Arc<Mutex<Option<TrackInfo>>>, tb: Arc<ManualTimebase>, auto_hide: bool) -> MediaWidget {
        let mut sensors = SensorSet::unavailable();
        sensors.media = Arc::new(move || Ok(Box::new(Playlist(list.clone())) as Box<dyn MediaSensor>));
        let cfg = WidgetConfig::new("winamp", "np", Rect::new(0, 0, 48, 10))
            .with("poll_interval", 0.01)
            .with("auto_hide", auto_hide);
        MediaWidget::new(&cfg, &WidgetContext::new(tb, sensors)).unwrap()
    }

    #[test]
    fn test_track_change_shows_and_resets_scroller() {
        let list = Arc::new(Mutex::new(Some(track("A rather long opening title", PlayStatus::Playing))));
        let tb = Arc::new(ManualTimebase::new());
        let w = widget(list.clone(), tb.clone(), true);
        wait_for(|| w.now_playing().is_some());
        assert!(w.render().unwrap().is_none());

        *list.lock().unwrap() = Some(track("Another long title for the ticker", PlayStatus::Playing));
        wait_for(|| w.now_playing().is_some_and(|np| np.epoch == 1));
        assert!(w.render().unwrap().is_some());
        tb.set_secs(0.5);
        w.render().unwrap();
        assert!(w.scroll_offset() > 0.0);

        *list.lock().unwrap() = Some(track("A third title that also needs scrolling", PlayStatus::Playing));
        wait_for(|| w.now_playing().is_some_and(|np| np.epoch == 2));
        assert!(w.render().unwrap().is_some());
        assert_eq!(w.scroll_offset(), 0.0);
        w.stop();
    }

    struct Shared(Arc<MediaWidget>);

    impl Widget for Shared {
        fn name(&self) -> &str { self.0.name() }
        fn kind(&self) -> &str { self.0.kind() }
        fn position(&self) -> Rect { self.0.position() }
        fn style(&self) -> Style { self.0.style() }
        fn update_interval(&self) -> Duration { self.0.update_interval() }
        fn update(&self) -> Result<(), WidgetError> { self.0.update() }
        fn render(&self) -> Result<Option<GrayRaster>, WidgetError> { self.0.render() }
        fn stop(&self) { self.0.stop() }
    }

    #[test]
    fn test_ticker_moves_every_frame() {
        let list = Arc::new(Mutex::new(Some(track("A rather long opening title for the ticker", PlayStatus::Playing))));
        let tb = Arc::new(ManualTimebase::new());
        let w = Arc::new(widget(list, tb.clone(), false));
        wait_for(|| w.now_playing().is_some());
        assert_eq!(w.update_interval(), Duration::from_secs(1));

        let mut c = Compositor::new(48, 10, vec![Box::new(Shared(w.clone()))], tb.clone());
        let mut offsets = Vec::new();
        for i in 0..10 {
            tb.set_secs(i as f64 * 0.1);
            c.tick();
            offsets.push(w.scroll_offset());
        }
        // default speed 20 px/s, 2 px per 100 ms frame
        assert!(offsets.windows(2).all(|p| p[1] > p[0]), "{:?}", offsets);
        assert!((offsets[9] - 18.0).abs() < 1e-6, "{:?}", offsets);
        c.stop_all();
    }

    #[test]
    fn test_absent_player_draws_placeholder_icon() {
        let list = Arc::new(Mutex::new(None));
        let w = widget(list, Arc::new(ManualTimebase::new()), false);
        wait_for(|| w.now_playing().is_some());
        let r = w.render().unwrap().unwrap();
        assert!(r.count(|v| v != 0) > 0);
        w.stop();
        assert!(w.update().is_ok());
        assert!(w.render().unwrap().is_none());
    }
}
