//! Instrumented in-memory driver shared by the integration tests.
//!
//! Every handle records its acquisition and release in a [`Ledger`]. Any
//! named driver call can be made to fail, staging rows can be padded, and
//! desktop frames are scripted.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::ptr::NonNull;
use std::rc::Rc;

use desktop_overlay::driver::{CpuAccess, FrameInfo, Gpu, Mapping, RawWindow, WindowHost};
use desktop_overlay::settings::SwapChainConfig;
use desktop_overlay::{Error, Status};

pub const DISPLAY_SIZE: (i32, i32) = (1920, 1080);

#[derive(Eq, PartialEq, Clone, Copy, Debug)]
pub enum Event {
    Acquired(&'static str),
    Released(&'static str),
}

pub enum ScriptedFrame {
    /// Packed BGRA desktop image.
    Image(Vec<u8>),
    Timeout,
    Fail(Status),
}

#[derive(Default)]
pub struct Ledger {
    events: RefCell<Vec<Event>>,
    live: RefCell<Vec<&'static str>>,
    calls: RefCell<Vec<&'static str>>,
    failure: Cell<Option<(&'static str, usize, Status)>>,
    staging_padding: Cell<usize>,
    desktop: Cell<(u32, u32)>,
    frames: RefCell<VecDeque<ScriptedFrame>>,
    presented: RefCell<Vec<Vec<u8>>>,
    reject_moves: Cell<bool>,
    reject_resizes: Cell<bool>,
    open_maps: Cell<usize>,
    frame_locked: Cell<bool>,
    next_window: Cell<isize>,
}

impl Ledger {
    pub fn new() -> Rc<Self> {
        let ledger = Self::default();
        ledger.desktop.set((8, 4));
        ledger.next_window.set(0x1000);
        Rc::new(ledger)
    }

    /// Fails the first call to `op` with `E_FAIL`.
    pub fn fail_on(&self, op: &'static str) {
        self.fail_with(op, 0, Status::FAIL);
    }

    /// Fails the call to `op` that follows `skip` successful ones.
    pub fn fail_with(&self, op: &'static str, skip: usize, status: Status) {
        self.failure.set(Some((op, skip, status)));
    }

    pub fn pad_staging_rows(&self, bytes: usize) {
        self.staging_padding.set(bytes);
    }

    pub fn set_desktop(&self, width: u32, height: u32) {
        self.desktop.set((width, height));
    }

    pub fn push_frame(&self, frame: ScriptedFrame) {
        self.frames.borrow_mut().push_back(frame);
    }

    pub fn reject_moves(&self, reject: bool) {
        self.reject_moves.set(reject);
    }

    pub fn reject_resizes(&self, reject: bool) {
        self.reject_resizes.set(reject);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    pub fn acquired(&self) -> Vec<&'static str> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                Event::Acquired(kind) => Some(*kind),
                Event::Released(_) => None,
            })
            .collect()
    }

    pub fn released(&self) -> Vec<&'static str> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                Event::Released(kind) => Some(*kind),
                Event::Acquired(_) => None,
            })
            .collect()
    }

    /// Kinds of the handles still alive, in acquisition order.
    pub fn live(&self) -> Vec<&'static str> {
        self.live.borrow().clone()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, op: &'static str) -> usize {
        self.calls.borrow().iter().filter(|call| **call == op).count()
    }

    pub fn presented(&self) -> Vec<Vec<u8>> {
        self.presented.borrow().clone()
    }

    pub fn last_presented(&self) -> Option<Vec<u8>> {
        self.presented.borrow().last().cloned()
    }

    pub fn open_maps(&self) -> usize {
        self.open_maps.get()
    }

    pub fn frame_locked(&self) -> bool {
        self.frame_locked.get()
    }

    fn call(&self, op: &'static str) -> Result<(), Error> {
        self.calls.borrow_mut().push(op);

        match self.failure.get() {
            Some((name, 0, status)) if name == op => {
                self.failure.set(None);
                Err(Error::from(status))
            }
            Some((name, skip, status)) if name == op => {
                self.failure.set(Some((name, skip - 1, status)));
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn acquire(&self, kind: &'static str) {
        self.events.borrow_mut().push(Event::Acquired(kind));
        self.live.borrow_mut().push(kind);
    }

    fn release(&self, kind: &'static str) {
        self.events.borrow_mut().push(Event::Released(kind));
        let mut live = self.live.borrow_mut();
        if let Some(index) = live.iter().rposition(|live| *live == kind) {
            live.remove(index);
        }
    }
}

/// One driver reference.
pub struct Handle {
    kind: &'static str,
    ledger: Rc<Ledger>,
}

impl Handle {
    fn new(ledger: &Rc<Ledger>, kind: &'static str) -> Self {
        ledger.acquire(kind);
        Self { kind, ledger: Rc::clone(ledger) }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.ledger.release(self.kind);
    }
}

/// Counts references to the buffers of a swap chain.
struct BufferRef(Rc<Cell<usize>>);

impl BufferRef {
    fn new(count: &Rc<Cell<usize>>) -> Self {
        count.set(count.get() + 1);
        Self(Rc::clone(count))
    }
}

impl Drop for BufferRef {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

pub struct FakeTexture {
    _handle: Handle,
    _buffer_ref: Option<BufferRef>,
    pub width: u32,
    pub height: u32,
    pub pitch: usize,
    memory: Rc<RefCell<Vec<u8>>>,
}

impl FakeTexture {
    pub fn bytes(&self) -> Vec<u8> {
        self.memory.borrow().clone()
    }
}

pub struct FakeSwapChain {
    _handle: Handle,
    size: Cell<(u32, u32)>,
    buffer_refs: Rc<Cell<usize>>,
    memory: Rc<RefCell<Vec<u8>>>,
}

pub struct FakeRenderTarget {
    _handle: Handle,
    _buffer_ref: Option<BufferRef>,
}

pub struct FakeFrameResource {
    _handle: Handle,
    image: Vec<u8>,
}

pub struct FakeVisual {
    _handle: Handle,
    content: Rc<RefCell<Vec<u8>>>,
}

pub struct FakeDevice(Handle);
pub struct FakeContext(Handle);

#[derive(Clone)]
pub struct FakeGpu {
    pub ledger: Rc<Ledger>,
}

impl FakeGpu {
    pub fn new(ledger: &Rc<Ledger>) -> Self {
        Self { ledger: Rc::clone(ledger) }
    }

    fn handle(&self, kind: &'static str) -> Handle {
        Handle::new(&self.ledger, kind)
    }
}

// SAFETY: `map` points into the texture's own allocation, which holds
// `pitch * height` bytes and is never reallocated while the texture lives.
unsafe impl Gpu for FakeGpu {
    type Device = FakeDevice;
    type Context = FakeContext;
    type DeviceInterface = Handle;
    type Adapter = Handle;
    type Factory = Handle;
    type Output = Handle;
    type DuplicationOutput = Handle;
    type Duplication = Handle;
    type FrameResource = FakeFrameResource;
    type SwapChain = FakeSwapChain;
    type Texture = FakeTexture;
    type RenderTarget = FakeRenderTarget;
    type Composition = Handle;
    type Visual = FakeVisual;
    type CompositionTarget = Handle;

    fn create_device(&self) -> Result<(Self::Device, Self::Context), Error> {
        self.ledger.call("create_device")?;
        let device = FakeDevice(self.handle("device"));
        let context = FakeContext(self.handle("context"));
        Ok((device, context))
    }

    fn device_interface(&self, _device: &Self::Device) -> Result<Self::DeviceInterface, Error> {
        self.ledger.call("device_interface")?;
        Ok(self.handle("device interface"))
    }

    fn adapter(&self, _device: &Self::DeviceInterface) -> Result<Self::Adapter, Error> {
        self.ledger.call("adapter")?;
        Ok(self.handle("adapter"))
    }

    fn factory(&self, _adapter: &Self::Adapter) -> Result<Self::Factory, Error> {
        self.ledger.call("factory")?;
        Ok(self.handle("factory"))
    }

    fn create_swap_chain(
        &self,
        _factory: &Self::Factory,
        _device: &Self::Device,
        width: u32,
        height: u32,
        config: &SwapChainConfig,
    ) -> Result<Self::SwapChain, Error> {
        self.ledger.call("create_swap_chain")?;
        assert_eq!(config.buffer_count, 2);

        Ok(FakeSwapChain {
            _handle: self.handle("swap chain"),
            size: Cell::new((width, height)),
            buffer_refs: Rc::new(Cell::new(0)),
            memory: Rc::new(RefCell::new(vec![0; width as usize * height as usize * 4])),
        })
    }

    fn create_composition(&self, _device: &Self::DeviceInterface) -> Result<Self::Composition, Error> {
        self.ledger.call("create_composition")?;
        Ok(self.handle("composition device"))
    }

    fn create_visual(
        &self,
        _composition: &Self::Composition,
        swap_chain: &Self::SwapChain,
    ) -> Result<Self::Visual, Error> {
        self.ledger.call("create_visual")?;
        Ok(FakeVisual { _handle: self.handle("visual"), content: Rc::clone(&swap_chain.memory) })
    }

    fn create_composition_target(
        &self,
        _composition: &Self::Composition,
        visual: &Self::Visual,
        window: RawWindow,
    ) -> Result<Self::CompositionTarget, Error> {
        self.ledger.call("create_composition_target")?;
        assert_ne!(window, RawWindow::default(), "composition target needs a window");
        assert!(!visual.content.borrow().is_empty(), "visual has no swap chain content");
        Ok(self.handle("composition target"))
    }

    fn back_buffer(&self, swap_chain: &Self::SwapChain) -> Result<Self::Texture, Error> {
        self.ledger.call("back_buffer")?;
        let (width, height) = swap_chain.size.get();

        Ok(FakeTexture {
            _handle: self.handle("back buffer"),
            _buffer_ref: Some(BufferRef::new(&swap_chain.buffer_refs)),
            width,
            height,
            pitch: width as usize * 4,
            memory: Rc::clone(&swap_chain.memory),
        })
    }

    fn create_render_target(
        &self,
        _device: &Self::Device,
        texture: &Self::Texture,
    ) -> Result<Self::RenderTarget, Error> {
        self.ledger.call("create_render_target")?;

        Ok(FakeRenderTarget {
            _handle: self.handle("render target"),
            _buffer_ref: texture._buffer_ref.as_ref().map(|buffer| BufferRef::new(&buffer.0)),
        })
    }

    fn resize_buffers(
        &self,
        swap_chain: &Self::SwapChain,
        width: u32,
        height: u32,
        _config: &SwapChainConfig,
    ) -> Result<(), Error> {
        self.ledger.call("resize_buffers")?;
        if swap_chain.buffer_refs.get() != 0 {
            return Err(Error::from(Status::DXGI_INVALID_CALL));
        }

        swap_chain.size.set((width, height));
        *swap_chain.memory.borrow_mut() = vec![0; width as usize * height as usize * 4];
        Ok(())
    }

    fn present(&self, swap_chain: &Self::SwapChain) -> Result<(), Error> {
        self.ledger.call("present")?;
        self.ledger.presented.borrow_mut().push(swap_chain.memory.borrow().clone());
        Ok(())
    }

    fn create_staging_texture(
        &self,
        _device: &Self::Device,
        width: u32,
        height: u32,
        _access: CpuAccess,
    ) -> Result<Self::Texture, Error> {
        self.ledger.call("create_staging_texture")?;
        let pitch = width as usize * 4 + self.ledger.staging_padding.get();

        Ok(FakeTexture {
            _handle: self.handle("staging texture"),
            _buffer_ref: None,
            width,
            height,
            pitch,
            memory: Rc::new(RefCell::new(vec![0; pitch * height as usize])),
        })
    }

    fn map(&self, _context: &Self::Context, texture: &Self::Texture, _access: CpuAccess) -> Result<Mapping, Error> {
        self.ledger.call("map")?;
        self.ledger.open_maps.set(self.ledger.open_maps.get() + 1);

        let data = texture.memory.borrow_mut().as_mut_ptr();
        Ok(Mapping { data: NonNull::new(data).ok_or(Error::Driver(Status::FAIL))?, row_pitch: texture.pitch })
    }

    fn unmap(&self, _context: &Self::Context, _texture: &Self::Texture) {
        self.ledger.calls.borrow_mut().push("unmap");
        self.ledger.open_maps.set(self.ledger.open_maps.get() - 1);
    }

    fn copy_resource(&self, _context: &Self::Context, destination: &Self::Texture, source: &Self::Texture) {
        self.ledger.calls.borrow_mut().push("copy_resource");

        let row_len = destination.width.min(source.width) as usize * 4;
        let rows = destination.height.min(source.height) as usize;
        let source_memory = source.memory.borrow();
        let mut destination_memory = destination.memory.borrow_mut();

        for row in 0..rows {
            let from = row * source.pitch;
            let to = row * destination.pitch;
            destination_memory[to..to + row_len].copy_from_slice(&source_memory[from..from + row_len]);
        }
    }

    fn primary_output(&self, _adapter: &Self::Adapter) -> Result<Self::Output, Error> {
        self.ledger.call("primary_output")?;
        Ok(self.handle("output"))
    }

    fn duplication_output(&self, _output: &Self::Output) -> Result<Self::DuplicationOutput, Error> {
        self.ledger.call("duplication_output")?;
        Ok(self.handle("duplication output"))
    }

    fn desktop_size(&self, _output: &Self::DuplicationOutput) -> Result<(u32, u32), Error> {
        self.ledger.call("desktop_size")?;
        Ok(self.ledger.desktop.get())
    }

    fn duplicate_output(
        &self,
        _output: &Self::DuplicationOutput,
        _device: &Self::Device,
    ) -> Result<Self::Duplication, Error> {
        self.ledger.call("duplicate_output")?;
        Ok(self.handle("duplication"))
    }

    fn acquire_next_frame(
        &self,
        _duplication: &Self::Duplication,
        _timeout_ms: u32,
    ) -> Result<(FrameInfo, Self::FrameResource), Error> {
        self.ledger.call("acquire_next_frame")?;
        assert!(!self.ledger.frame_locked.get(), "previous frame was never released");

        let frame = self.ledger.frames.borrow_mut().pop_front().unwrap_or(ScriptedFrame::Timeout);
        match frame {
            ScriptedFrame::Image(image) => {
                self.ledger.frame_locked.set(true);
                let info = FrameInfo { accumulated_frames: 1, last_present_time: 42, ..FrameInfo::default() };
                Ok((info, FakeFrameResource { _handle: self.handle("frame resource"), image }))
            }
            ScriptedFrame::Timeout => Err(Error::from(Status::DXGI_WAIT_TIMEOUT)),
            ScriptedFrame::Fail(status) => Err(Error::from(status)),
        }
    }

    fn frame_texture(&self, resource: &Self::FrameResource) -> Result<Self::Texture, Error> {
        self.ledger.call("frame_texture")?;
        let (width, height) = self.ledger.desktop.get();

        Ok(FakeTexture {
            _handle: self.handle("frame texture"),
            _buffer_ref: None,
            width,
            height,
            pitch: width as usize * 4,
            memory: Rc::new(RefCell::new(resource.image.clone())),
        })
    }

    fn release_frame(&self, _duplication: &Self::Duplication) -> Result<(), Error> {
        self.ledger.frame_locked.set(false);
        self.ledger.call("release_frame")
    }
}

pub struct FakeWindow {
    _handle: Handle,
    pub name: String,
    raw: isize,
    pub position: Cell<(i32, i32)>,
    pub size: Cell<(i32, i32)>,
}

#[derive(Clone)]
pub struct FakeHost {
    pub ledger: Rc<Ledger>,
}

impl FakeHost {
    pub fn new(ledger: &Rc<Ledger>) -> Self {
        Self { ledger: Rc::clone(ledger) }
    }
}

impl WindowHost for FakeHost {
    type Window = FakeWindow;

    fn create_window(&self, name: &str, x: i32, y: i32, width: i32, height: i32) -> Result<Self::Window, Error> {
        self.ledger.call("create_window")?;
        let raw = self.ledger.next_window.get();
        self.ledger.next_window.set(raw + 1);

        Ok(FakeWindow {
            _handle: Handle::new(&self.ledger, "window"),
            name: name.to_owned(),
            raw,
            position: Cell::new((x, y)),
            size: Cell::new((width, height)),
        })
    }

    fn raw_window(&self, window: &Self::Window) -> RawWindow {
        RawWindow(window.raw)
    }

    fn move_window(&self, window: &Self::Window, x: i32, y: i32) -> Result<(), Error> {
        self.ledger.call("move_window")?;
        if self.ledger.reject_moves.get() {
            return Err(Error::Driver(Status::FAIL));
        }
        window.position.set((x, y));
        Ok(())
    }

    fn resize_window(&self, window: &Self::Window, width: i32, height: i32) -> Result<(), Error> {
        self.ledger.call("resize_window")?;
        if self.ledger.reject_resizes.get() {
            return Err(Error::Driver(Status::FAIL));
        }
        window.size.set((width, height));
        Ok(())
    }

    fn pump_messages(&self, _window: &Self::Window) {
        self.ledger.calls.borrow_mut().push("pump_messages");
    }

    fn display_size(&self) -> (i32, i32) {
        DISPLAY_SIZE
    }
}

/// Packed BGRA test image where every byte encodes its own position.
pub fn gradient(width: u32, height: u32) -> Vec<u8> {
    (0..width as usize * height as usize * 4).map(|i| (i % 251) as u8).collect()
}
